//! AST to bytecode lowering.
//!
//! Single pass over the tree. Forward jumps are emitted with a placeholder
//! address and patched once the target is known.

use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::debug;

use crate::ast::{Binding, Block, Expr, FunctionLiteral, Program, Stmt, TemplatePart};
use crate::token::TokenKind;
use crate::util::{FastHashMap, fast_hash_map_new};
use crate::val::{CompareOp, Lambda, Value};

use super::bytecode::Bytecode;
use super::opcode::{COMPARE_ABSENT, MAKE_ARRAY, MAKE_MAP, Opcode};

pub struct Compiler {
    code: Vec<u8>,
    constants: Vec<Value>,
    strings: FastHashMap<Arc<str>, u16>,
    entries: Vec<usize>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiles a whole program; the result ends with `HALT`.
pub fn compile(program: &Program) -> Result<Bytecode> {
    let mut compiler = Compiler::new();
    compiler.compile_program(program)?;
    let bytecode = compiler.finish();
    debug!(
        target: "kit::build",
        bytes = bytecode.code.len(),
        constants = bytecode.constants.len(),
        functions = bytecode.entries.len(),
        "compiled program"
    );
    Ok(bytecode)
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            constants: Vec::new(),
            strings: fast_hash_map_new(),
            entries: Vec::new(),
        }
    }

    pub fn compile_program(&mut self, program: &Program) -> Result<()> {
        self.entries = vec![Lambda::UNBOUND; program.fn_count];
        self.compile_statements(&program.statements, false)?;
        self.emit(Opcode::Halt);
        Ok(())
    }

    pub fn finish(self) -> Bytecode {
        Bytecode {
            code: self.code,
            constants: self.constants,
            entries: self.entries,
        }
    }

    /// Expression statements are popped except the last one, whose value is
    /// left as the list's result. With `want_value` the list always leaves
    /// exactly one value, nil when the last statement produces none.
    fn compile_statements(&mut self, stmts: &[Stmt], want_value: bool) -> Result<()> {
        let last = stmts.len().saturating_sub(1);
        let mut left_value = false;
        for (i, stmt) in stmts.iter().enumerate() {
            left_value = self.compile_stmt(stmt, i == last)?;
        }
        if want_value && !left_value {
            self.emit_constant(Value::nil())?;
        }
        Ok(())
    }

    /// Returns whether the statement left a value on the stack.
    fn compile_stmt(&mut self, stmt: &Stmt, keep: bool) -> Result<bool> {
        match stmt {
            Stmt::Expr(e) => {
                self.compile_expr(e)?;
                if !keep {
                    self.emit(Opcode::Pop);
                }
                Ok(keep)
            }
            Stmt::Block(b) => {
                self.compile_block(b)?;
                if !keep {
                    self.emit(Opcode::Pop);
                }
                Ok(keep)
            }
            Stmt::VarDecl { binding, value, .. } => {
                self.compile_expr(value)?;
                self.compile_binding(binding)?;
                Ok(false)
            }
            Stmt::Return(value) => {
                match value {
                    Some(e) => self.compile_expr(e)?,
                    None => self.emit_constant(Value::nil())?,
                }
                self.emit(Opcode::Return);
                Ok(false)
            }
            Stmt::ForIn { item, iterable, body } => {
                self.compile_for_in(item, iterable, body)?;
                Ok(false)
            }
            Stmt::Defer(e) => {
                self.compile_expr(e)?;
                self.emit(Opcode::Defer);
                Ok(false)
            }
            Stmt::Spawn(e) => {
                self.compile_expr(e)?;
                self.emit(Opcode::Spawn);
                Ok(false)
            }
        }
    }

    /// A block used as a value: always leaves one value.
    fn compile_block(&mut self, block: &Block) -> Result<()> {
        self.compile_statements(&block.statements, true)
    }

    /// Consumes the value on top of the stack.
    fn compile_binding(&mut self, binding: &Binding) -> Result<()> {
        match binding {
            Binding::Name(name) => {
                self.emit_name(Opcode::Store, name)?;
            }
            Binding::Object(names) => {
                for name in names {
                    self.emit(Opcode::Dup);
                    self.emit_string(name)?;
                    self.emit(Opcode::Get);
                    self.emit_name(Opcode::Store, name)?;
                    self.emit(Opcode::Pop);
                }
            }
            Binding::Array(names) => {
                for (i, name) in names.iter().enumerate() {
                    self.emit(Opcode::Dup);
                    self.emit_constant(Value::number(i as f64))?;
                    self.emit(Opcode::Get);
                    self.emit_name(Opcode::Store, name)?;
                    self.emit(Opcode::Pop);
                }
            }
        }
        self.emit(Opcode::Pop);
        Ok(())
    }

    // iterable; PUSH 0; top: ITER exit; STORE item; POP; body; POP; JUMP top
    fn compile_for_in(&mut self, item: &Arc<str>, iterable: &Expr, body: &Block) -> Result<()> {
        self.compile_expr(iterable)?;
        self.emit_constant(Value::number(0.0))?;
        let top = self.here()?;
        let exit = self.emit_jump(Opcode::Iter);
        self.emit_name(Opcode::Store, item)?;
        self.emit(Opcode::Pop);
        self.compile_block(body)?;
        self.emit(Opcode::Pop);
        self.emit_u16(Opcode::Jump, top);
        self.patch_here(exit)
    }

    pub fn compile_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Identifier(name) => self.emit_name(Opcode::Load, name)?,
            Expr::Literal(v) => match v.as_arc_str() {
                Some(s) => self.emit_string(s)?,
                None => self.emit_constant(v.clone())?,
            },
            Expr::Prefix { op, right } => {
                self.compile_expr(right)?;
                match op {
                    TokenKind::Bang => self.emit(Opcode::Not),
                    TokenKind::Minus => {
                        self.emit_constant(Value::number(-1.0))?;
                        self.emit(Opcode::Mul);
                    }
                    other => bail!("unsupported prefix operator {other}"),
                }
            }
            Expr::Infix { left, op, right } => self.compile_infix(left, *op, right)?,
            Expr::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expr(condition)?;
                let else_jump = self.emit_jump(Opcode::False);
                self.compile_block(consequence)?;
                let end_jump = self.emit_jump(Opcode::Jump);
                self.patch_here(else_jump)?;
                match alternative {
                    Some(alt) => self.compile_block(alt)?,
                    None => self.emit_constant(Value::nil())?,
                }
                self.patch_here(end_jump)?;
            }
            Expr::Call { callee, args } => {
                self.compile_expr(callee)?;
                for a in args {
                    self.compile_expr(a)?;
                }
                let argc = arg_count(args.len())?;
                self.emit_u8(Opcode::Call, argc);
            }
            Expr::Member { object, property } => {
                self.compile_expr(object)?;
                self.emit_string(property)?;
                self.emit(Opcode::Get);
            }
            Expr::Index { object, index } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit(Opcode::Get);
            }
            Expr::Assign { target, value } => self.compile_assign(target, value)?,
            Expr::Array(items) => {
                self.emit_u8(Opcode::Make, MAKE_ARRAY);
                for (i, item) in items.iter().enumerate() {
                    self.emit_constant(Value::number(i as f64))?;
                    self.compile_expr(item)?;
                    self.emit(Opcode::Set);
                }
            }
            Expr::Object(pairs) => {
                self.emit_u8(Opcode::Make, MAKE_MAP);
                for (k, v) in pairs {
                    self.compile_expr(k)?;
                    self.compile_expr(v)?;
                    self.emit(Opcode::Set);
                }
            }
            // Only meaningful in front of `=>`; the parser never leaves one alone.
            Expr::Params(_) => self.emit_constant(Value::nil())?,
            Expr::Function(func) => self.compile_function(func)?,
            Expr::MethodCall { object, method, args } => {
                self.compile_expr(object)?;
                for a in args {
                    self.compile_expr(a)?;
                }
                self.emit_string(method)?;
                let argc = arg_count(args.len())?;
                self.emit_u8(Opcode::Invoke, argc);
            }
            Expr::Template(parts) => {
                self.emit_string(&Arc::from(""))?;
                for part in parts {
                    match part {
                        TemplatePart::Text(t) => self.emit_string(t)?,
                        TemplatePart::Expr(e) => self.compile_expr(e)?,
                    }
                    self.emit(Opcode::Add);
                }
            }
        }
        Ok(())
    }

    fn compile_infix(&mut self, left: &Expr, op: TokenKind, right: &Expr) -> Result<()> {
        self.compile_expr(left)?;
        match op {
            TokenKind::And | TokenKind::Or => {
                // DUP; FALSE/TRUE end; POP; rhs
                self.emit(Opcode::Dup);
                let branch = if op == TokenKind::And { Opcode::False } else { Opcode::True };
                let end = self.emit_jump(branch);
                self.emit(Opcode::Pop);
                self.compile_expr(right)?;
                return self.patch_here(end);
            }
            TokenKind::Nullish => {
                // DUP; COMPARE absent; TRUE take; JUMP end; take: POP; rhs
                self.emit(Opcode::Dup);
                self.emit_u8(Opcode::Compare, COMPARE_ABSENT);
                let take = self.emit_jump(Opcode::True);
                let end = self.emit_jump(Opcode::Jump);
                self.patch_here(take)?;
                self.emit(Opcode::Pop);
                self.compile_expr(right)?;
                return self.patch_here(end);
            }
            _ => {}
        }
        self.compile_expr(right)?;
        let arith = match op {
            TokenKind::Plus => Some(Opcode::Add),
            TokenKind::Minus => Some(Opcode::Sub),
            TokenKind::Star => Some(Opcode::Mul),
            TokenKind::Slash => Some(Opcode::Div),
            TokenKind::Percent => Some(Opcode::Mod),
            _ => None,
        };
        if let Some(code) = arith {
            self.emit(code);
            return Ok(());
        }
        match CompareOp::from_operator(op.as_str()) {
            Some(cmp) => {
                self.emit_u8(Opcode::Compare, cmp.mode());
                Ok(())
            }
            None => bail!("unsupported infix operator {op}"),
        }
    }

    fn compile_assign(&mut self, target: &Expr, value: &Expr) -> Result<()> {
        match target {
            Expr::Identifier(name) => {
                self.compile_expr(value)?;
                self.emit_name(Opcode::Store, name)
            }
            Expr::Member { object, property } => {
                self.compile_expr(object)?;
                self.emit_string(property)?;
                self.compile_expr(value)?;
                self.emit(Opcode::Set);
                Ok(())
            }
            Expr::Index { object, index } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.compile_expr(value)?;
                self.emit(Opcode::Set);
                Ok(())
            }
            other => bail!("invalid assignment target {other}"),
        }
    }

    // JUMP over; body; RETURN; over: PUSH descriptor
    fn compile_function(&mut self, func: &FunctionLiteral) -> Result<()> {
        let over = self.emit_jump(Opcode::Jump);
        let entry = self.code.len();
        if let Some(slot) = self.entries.get_mut(func.id) {
            *slot = entry;
        } else {
            self.entries.resize(func.id, Lambda::UNBOUND);
            self.entries.push(entry);
        }
        self.compile_statements(&func.body.statements, true)?;
        self.emit(Opcode::Return);
        self.patch_here(over)?;
        let params: Vec<Arc<str>> = func.params.iter().map(Arc::clone).collect();
        self.emit_constant(Value::lambda(Lambda::descriptor(entry, params)))
    }

    // --- emission ---

    #[inline]
    fn emit(&mut self, op: Opcode) {
        self.code.push(op as u8);
    }

    fn emit_u8(&mut self, op: Opcode, operand: u8) {
        self.code.push(op as u8);
        self.code.push(operand);
    }

    fn emit_u16(&mut self, op: Opcode, operand: u16) {
        self.code.push(op as u8);
        self.code.extend_from_slice(&operand.to_be_bytes());
    }

    /// Emits `op` with a placeholder address and returns the operand offset.
    fn emit_jump(&mut self, op: Opcode) -> usize {
        self.emit_u16(op, u16::MAX);
        self.code.len() - 2
    }

    fn here(&self) -> Result<u16> {
        match u16::try_from(self.code.len()) {
            Ok(addr) => Ok(addr),
            Err(_) => bail!("program too large: code exceeds {} bytes", u16::MAX),
        }
    }

    fn patch_here(&mut self, operand_at: usize) -> Result<()> {
        let target = self.here()?;
        self.code[operand_at..operand_at + 2].copy_from_slice(&target.to_be_bytes());
        Ok(())
    }

    fn add_constant(&mut self, v: Value) -> Result<u16> {
        let idx = self.constants.len();
        match u16::try_from(idx) {
            Ok(idx) => {
                self.constants.push(v);
                Ok(idx)
            }
            Err(_) => bail!("too many constants (limit {})", u16::MAX),
        }
    }

    fn emit_constant(&mut self, v: Value) -> Result<()> {
        let idx = self.add_constant(v)?;
        self.emit_u16(Opcode::Push, idx);
        Ok(())
    }

    /// String constants are pooled so names and repeated literals share a slot.
    fn string_index(&mut self, s: &Arc<str>) -> Result<u16> {
        if let Some(&idx) = self.strings.get(s) {
            return Ok(idx);
        }
        let idx = self.add_constant(Value::string(s.clone()))?;
        self.strings.insert(s.clone(), idx);
        Ok(idx)
    }

    fn emit_string(&mut self, s: &Arc<str>) -> Result<()> {
        let idx = self.string_index(s)?;
        self.emit_u16(Opcode::Push, idx);
        Ok(())
    }

    fn emit_name(&mut self, op: Opcode, name: &Arc<str>) -> Result<()> {
        let idx = self.string_index(name)?;
        self.emit_u16(op, idx);
        Ok(())
    }
}

fn arg_count(n: usize) -> Result<u8> {
    match u8::try_from(n) {
        Ok(n) => Ok(n),
        Err(_) => bail!("too many arguments ({n}, limit {})", u8::MAX),
    }
}

