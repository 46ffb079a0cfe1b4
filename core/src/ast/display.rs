use std::fmt::{self, Display};

use super::{Binding, Block, Expr, FunctionLiteral, Program, Stmt, TemplatePart};

fn join<T: Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        join(f, &self.statements, "\n")
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{ ")?;
        join(f, &self.statements, " ")?;
        f.write_str(" }")
    }
}

impl Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Name(n) => f.write_str(n),
            Binding::Object(names) => {
                f.write_str("{")?;
                join(f, names, ", ")?;
                f.write_str("}")
            }
            Binding::Array(names) => {
                f.write_str("[")?;
                join(f, names, ", ")?;
                f.write_str("]")
            }
        }
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::VarDecl {
                binding,
                value,
                is_const,
            } => {
                let kw = if *is_const { "const" } else { "let" };
                write!(f, "{kw} {binding} = {value};")
            }
            Stmt::Expr(e) => write!(f, "{e}"),
            Stmt::Block(b) => write!(f, "{b}"),
            Stmt::Return(Some(e)) => write!(f, "return {e};"),
            Stmt::Return(None) => f.write_str("return;"),
            Stmt::ForIn { item, iterable, body } => write!(f, "for ({item} in {iterable}) {body}"),
            Stmt::Defer(e) => write!(f, "defer {e};"),
            Stmt::Spawn(e) => write!(f, "go {e};"),
        }
    }
}

impl Display for FunctionLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        join(f, &self.params, ", ")?;
        write!(f, ") => {}", self.body)
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Identifier(name) => f.write_str(name),
            Expr::Literal(v) if v.is_string() => write!(f, "{:?}", v.text()),
            Expr::Literal(v) => write!(f, "{}", v.text()),
            Expr::Prefix { op, right } => write!(f, "({op}{right})"),
            Expr::Infix { left, op, right } => write!(f, "({left} {op} {right})"),
            Expr::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if {condition} {consequence}")?;
                if let Some(alt) = alternative {
                    write!(f, " else {alt}")?;
                }
                Ok(())
            }
            Expr::Call { callee, args } => {
                write!(f, "{callee}(")?;
                join(f, args, ", ")?;
                f.write_str(")")
            }
            Expr::Member { object, property } => write!(f, "{object}.{property}"),
            Expr::Index { object, index } => write!(f, "({object}[{index}])"),
            Expr::Assign { target, value } => write!(f, "{target} = {value}"),
            Expr::Array(items) => {
                f.write_str("[")?;
                join(f, items, ", ")?;
                f.write_str("]")
            }
            Expr::Object(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Expr::Params(names) => {
                f.write_str("(")?;
                join(f, names, ", ")?;
                f.write_str(")")
            }
            Expr::Function(func) => write!(f, "{func}"),
            Expr::MethodCall { object, method, args } => {
                write!(f, "{object}.{method}(")?;
                join(f, args, ", ")?;
                f.write_str(")")
            }
            Expr::Template(parts) => {
                f.write_str("`")?;
                for part in parts {
                    match part {
                        TemplatePart::Text(t) => f.write_str(t)?,
                        TemplatePart::Expr(e) => write!(f, "${{{e}}}")?,
                    }
                }
                f.write_str("`")
            }
        }
    }
}
