//! Tree-walking evaluator for the discovery pass.
//!
//! Runs a program's top-level statements once, before any VM exists, so the
//! script can call host registration functions. Errors are `Invalid` values
//! that short-circuit every enclosing expression.

use std::sync::Arc;

use tracing::trace;

use crate::ast::{Binding, Block, Expr, FunctionLiteral, Program, Stmt, TemplatePart};
use crate::token::TokenKind;
use crate::val::{CompareOp, Kind, Lambda, Value};
use crate::vm::Globals;

mod env;

pub use env::Environment;

pub struct Evaluator<'a> {
    globals: Option<&'a Globals>,
    /// Compiled entry address per function literal id.
    entries: &'a [usize],
}

impl<'a> Default for Evaluator<'a> {
    fn default() -> Self {
        Self::new()
    }
}

/// Stops a statement sequence early.
#[inline]
fn interrupts(v: &Value) -> bool {
    matches!(v.kind(), Kind::Return | Kind::Invalid)
}

macro_rules! try_valid {
    ($e:expr) => {{
        let v = $e;
        if v.is_invalid() {
            return v;
        }
        v
    }};
}

impl<'a> Evaluator<'a> {
    pub fn new() -> Self {
        Self {
            globals: None,
            entries: &[],
        }
    }

    /// Unresolved identifiers fall back to `globals`.
    pub fn with_globals(mut self, globals: &'a Globals) -> Self {
        self.globals = Some(globals);
        self
    }

    /// Binds function literals to the entry addresses produced by the
    /// compiler for the same program, making them callable by a VM later.
    pub fn with_entries(mut self, entries: &'a [usize]) -> Self {
        self.entries = entries;
        self
    }

    pub fn eval_program(&self, program: &Program, env: &Environment) -> Value {
        let mut last = Value::nil();
        for stmt in &program.statements {
            last = self.eval_stmt(stmt, env);
            if last.is_invalid() {
                return last;
            }
            if last.kind() == Kind::Return {
                return last.unwrap_return();
            }
        }
        last
    }

    fn eval_block(&self, block: &Block, env: &Environment) -> Value {
        let inner = Environment::enclosed(env);
        let mut last = Value::nil();
        for stmt in &block.statements {
            last = self.eval_stmt(stmt, &inner);
            if interrupts(&last) {
                return last;
            }
        }
        last
    }

    fn eval_stmt(&self, stmt: &Stmt, env: &Environment) -> Value {
        match stmt {
            Stmt::VarDecl { binding, value, .. } => {
                let v = try_valid!(self.eval(value, env));
                match binding {
                    Binding::Name(name) => {
                        env.set(name.clone(), v);
                    }
                    Binding::Object(names) => {
                        for name in names {
                            env.set(name.clone(), v.get(name));
                        }
                    }
                    Binding::Array(names) => {
                        for (i, name) in names.iter().enumerate() {
                            env.set(name.clone(), v.index(i as i64));
                        }
                    }
                }
                Value::nil()
            }
            Stmt::Expr(e) => self.eval(e, env),
            Stmt::Block(b) => self.eval_block(b, env),
            Stmt::Return(e) => {
                let v = match e {
                    Some(e) => try_valid!(self.eval(e, env)),
                    None => Value::nil(),
                };
                Value::returned(v)
            }
            Stmt::ForIn { item, iterable, body } => {
                let col = try_valid!(self.eval(iterable, env));
                for x in col.iter_items() {
                    let inner = Environment::enclosed(env);
                    inner.set(item.clone(), x);
                    let r = self.eval_block(body, &inner);
                    if interrupts(&r) {
                        return r;
                    }
                }
                Value::nil()
            }
            Stmt::Defer(e) | Stmt::Spawn(e) => {
                // Discovery never runs deferred or spawned work.
                let v = try_valid!(self.eval(e, env));
                trace!(target: "kit::build", kind = %v.kind(), "skipping deferred work during discovery");
                Value::nil()
            }
        }
    }

    pub fn eval(&self, expr: &Expr, env: &Environment) -> Value {
        match expr {
            Expr::Identifier(name) => self.lookup(name, env),
            Expr::Literal(v) => v.clone(),
            Expr::Prefix { op, right } => {
                let right = try_valid!(self.eval(right, env));
                match op {
                    TokenKind::Bang => Value::bool(!right.truthy()),
                    TokenKind::Minus => &right * &Value::number(-1.0),
                    other => Value::invalid_because(format!("unsupported prefix operator {other}")),
                }
            }
            Expr::Infix { left, op, right } => self.eval_infix(left, *op, right, env),
            Expr::If {
                condition,
                consequence,
                alternative,
            } => {
                let cond = try_valid!(self.eval(condition, env));
                if cond.truthy() {
                    self.eval_block(consequence, env)
                } else if let Some(alt) = alternative {
                    self.eval_block(alt, env)
                } else {
                    Value::nil()
                }
            }
            Expr::Call { callee, args } => {
                let callee = try_valid!(self.eval(callee, env));
                let args = match self.eval_all(args, env) {
                    Ok(args) => args,
                    Err(bad) => return bad,
                };
                call_value(&callee, &args)
            }
            Expr::Member { object, property } => {
                let obj = self.eval(object, env);
                if obj.is_blank() {
                    return obj;
                }
                obj.get(property)
            }
            Expr::Index { object, index } => {
                let obj = try_valid!(self.eval(object, env));
                let idx = try_valid!(self.eval(index, env));
                obj.get_by(&idx)
            }
            Expr::Assign { target, value } => self.eval_assign(target, value, env),
            Expr::Array(items) => match self.eval_all(items, env) {
                Ok(items) => Value::array(items),
                Err(bad) => bad,
            },
            Expr::Object(pairs) => {
                let out = Value::empty_map();
                for (k, v) in pairs {
                    let key = try_valid!(self.eval(k, env));
                    let val = try_valid!(self.eval(v, env));
                    out.set(&Value::string(key.text()), val);
                }
                out
            }
            Expr::Params(_) => Value::nil(),
            Expr::Function(func) => self.make_lambda(func, env),
            Expr::MethodCall { object, method, args } => {
                let target = self.eval(object, env);
                if target.is_blank() {
                    return target;
                }
                let args = match self.eval_all(args, env) {
                    Ok(args) => args,
                    Err(bad) => return bad,
                };
                target.invoke(method, &args)
            }
            Expr::Template(parts) => {
                let mut out = Value::string("");
                for part in parts {
                    let piece = match part {
                        TemplatePart::Text(t) => Value::string(t.clone()),
                        TemplatePart::Expr(e) => try_valid!(self.eval(e, env)),
                    };
                    out = &out + &piece;
                }
                out
            }
        }
    }

    fn lookup(&self, name: &str, env: &Environment) -> Value {
        if let Some(v) = env.get(name) {
            return v;
        }
        if let Some(v) = self.globals.and_then(|g| g.get(name)) {
            return v.clone();
        }
        Value::invalid_because(format!("identifier not found: {name}"))
    }

    fn eval_infix(&self, left: &Expr, op: TokenKind, right: &Expr, env: &Environment) -> Value {
        let l = try_valid!(self.eval(left, env));
        match op {
            TokenKind::And => {
                return if l.truthy() { self.eval(right, env) } else { l };
            }
            TokenKind::Or => {
                return if l.truthy() { l } else { self.eval(right, env) };
            }
            // The literal text "null" counts as absent, same as nil.
            TokenKind::Nullish => {
                return if l.is_nil() || l.as_str() == Some("null") {
                    self.eval(right, env)
                } else {
                    l
                };
            }
            _ => {}
        }
        let r = try_valid!(self.eval(right, env));
        binary_op(op, &l, &r)
    }

    fn eval_assign(&self, target: &Expr, value: &Expr, env: &Environment) -> Value {
        match target {
            Expr::Identifier(name) => {
                let v = try_valid!(self.eval(value, env));
                env.assign(name, v)
            }
            Expr::Member { object, property } => {
                let obj = try_valid!(self.eval(object, env));
                let v = try_valid!(self.eval(value, env));
                obj.set(&Value::string(property.clone()), v);
                obj
            }
            Expr::Index { object, index } => {
                let obj = try_valid!(self.eval(object, env));
                let key = try_valid!(self.eval(index, env));
                let v = try_valid!(self.eval(value, env));
                obj.set(&key, v);
                obj
            }
            other => Value::invalid_because(format!("invalid assignment target {other}")),
        }
    }

    fn eval_all(&self, exprs: &[Expr], env: &Environment) -> Result<Vec<Value>, Value> {
        let mut out = Vec::with_capacity(exprs.len());
        for e in exprs {
            let v = self.eval(e, env);
            if v.is_invalid() {
                return Err(v);
            }
            out.push(v);
        }
        Ok(out)
    }

    fn make_lambda(&self, func: &FunctionLiteral, env: &Environment) -> Value {
        let address = self.entries.get(func.id).copied().unwrap_or(Lambda::UNBOUND);
        let descriptor = Lambda::descriptor(address, func.params.iter().map(Arc::clone).collect());
        Value::lambda(descriptor.capture(env.scope().clone()))
    }
}

/// Calls a value that needs no VM: natives, bound methods and proxies.
pub(crate) fn call_value(callee: &Value, args: &[Value]) -> Value {
    if let Some(p) = callee.as_proxy() {
        return p.on_invoke("", args);
    }
    match callee.as_callable() {
        Some(c) => c.call_native(args),
        None => Value::invalid_because(format!("{} is not callable", callee.kind())),
    }
}

/// Eager binary operators. Comparisons involving a proxy are delegated to its
/// handler with the proxy as the left operand.
pub(crate) fn binary_op(op: TokenKind, l: &Value, r: &Value) -> Value {
    match op {
        TokenKind::Plus => l + r,
        TokenKind::Minus => l - r,
        TokenKind::Star => l * r,
        TokenKind::Slash => l / r,
        TokenKind::Percent => l % r,
        other => match CompareOp::from_operator(other.as_str()) {
            Some(cmp) => compare_values(cmp, l, r),
            None => Value::invalid_because(format!("unsupported infix operator {other}")),
        },
    }
}

pub(crate) fn compare_values(cmp: CompareOp, l: &Value, r: &Value) -> Value {
    if let Some(p) = l.as_proxy() {
        return p.on_compare(cmp, r);
    }
    if let Some(p) = r.as_proxy() {
        return p.on_compare(cmp.flip(), l);
    }
    Value::bool(cmp.apply(l, r))
}
