//! Syntax tree shared by the discovery evaluator and the bytecode compiler.

use std::sync::Arc;

use crate::token::TokenKind;
use crate::val::Value;

mod display;
mod parser;

pub use parser::{MAX_NESTING_DEPTH, Parser, parse};

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
    /// Number of function literals in the tree; ids are `0..fn_count`.
    pub fn_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

impl Block {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}

/// Left-hand side of `let`/`const`.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Name(Arc<str>),
    /// `{a, b}`: each name reads the key of the same name.
    Object(Vec<Arc<str>>),
    /// `[a, b]`: each name reads the element at its position.
    Array(Vec<Arc<str>>),
}

impl Binding {
    pub fn names(&self) -> &[Arc<str>] {
        match self {
            Binding::Name(n) => std::slice::from_ref(n),
            Binding::Object(names) | Binding::Array(names) => names,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    VarDecl {
        binding: Binding,
        value: Expr,
        is_const: bool,
    },
    Expr(Expr),
    Block(Block),
    Return(Option<Expr>),
    ForIn {
        item: Arc<str>,
        iterable: Expr,
        body: Block,
    },
    /// Operand is a closure expression; call forms are wrapped by the parser.
    Defer(Expr),
    Spawn(Expr),
}

#[derive(Debug, Clone)]
pub struct FunctionLiteral {
    pub id: usize,
    pub params: Vec<Arc<str>>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub enum TemplatePart {
    Text(Arc<str>),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Identifier(Arc<str>),
    Literal(Value),
    Prefix {
        op: TokenKind,
        right: Box<Expr>,
    },
    Infix {
        left: Box<Expr>,
        op: TokenKind,
        right: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        consequence: Block,
        alternative: Option<Block>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: Arc<str>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Array(Vec<Expr>),
    Object(Vec<(Expr, Expr)>),
    /// `(a, b)` directly before `=>`. Only valid as an arrow's left side.
    Params(Vec<Arc<str>>),
    Function(FunctionLiteral),
    MethodCall {
        object: Box<Expr>,
        method: Arc<str>,
        args: Vec<Expr>,
    },
    Template(Vec<TemplatePart>),
}

impl Expr {
    pub fn is_call(&self) -> bool {
        matches!(self, Expr::Call { .. } | Expr::MethodCall { .. })
    }
}

#[cfg(test)]
mod ast_test;
