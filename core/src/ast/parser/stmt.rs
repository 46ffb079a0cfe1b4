use std::sync::Arc;

use crate::ast::{Binding, Block, Expr, FunctionLiteral, Stmt};
use crate::token::TokenKind;
use crate::val::Value;

use super::{Parser, Precedence};

impl<'src> Parser<'src> {
    pub(super) fn parse_statement(&mut self) -> Option<Stmt> {
        let kind = self.cur().kind;
        let stmt = match kind {
            TokenKind::Semicolon => {
                self.bump();
                return None;
            }
            TokenKind::Let | TokenKind::Const => self.parse_var_decl(),
            TokenKind::Return => self.parse_return(),
            TokenKind::For => self.parse_for_in(),
            TokenKind::Defer => {
                self.bump();
                self.parse_deferred_operand().map(Stmt::Defer)
            }
            TokenKind::Go => {
                self.bump();
                self.parse_deferred_operand().map(Stmt::Spawn)
            }
            TokenKind::LBrace => self.parse_block().map(Stmt::Block),
            _ => self.parse_expression(Precedence::Lowest).map(Stmt::Expr),
        };
        self.eat(TokenKind::Semicolon);
        stmt
    }

    /// `{ stmt* }`; stray semicolons are skipped.
    pub(super) fn parse_block(&mut self) -> Option<Block> {
        let entry = self.depth;
        let block = self.parse_nested_block();
        self.depth = entry;
        block
    }

    fn parse_nested_block(&mut self) -> Option<Block> {
        self.descend()?;
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let before = self.pos;
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            if self.pos == before {
                self.bump();
            }
        }
        self.expect(TokenKind::RBrace)?;
        Some(Block::new(statements))
    }

    /// A braced block, or a single statement standing in for one.
    pub(super) fn parse_branch(&mut self) -> Option<Block> {
        if self.at(TokenKind::LBrace) {
            return self.parse_block();
        }
        self.parse_statement().map(|s| Block::new(vec![s]))
    }

    fn parse_var_decl(&mut self) -> Option<Stmt> {
        let is_const = self.bump().kind == TokenKind::Const;
        let kind = self.cur().kind;
        let binding = match kind {
            TokenKind::LBrace => Binding::Object(self.parse_name_list(TokenKind::LBrace, TokenKind::RBrace)?),
            TokenKind::LBracket => {
                Binding::Array(self.parse_name_list(TokenKind::LBracket, TokenKind::RBracket)?)
            }
            _ => Binding::Name(self.parse_name()?),
        };
        let value = if self.eat(TokenKind::Assign) {
            self.parse_expression(Precedence::Lowest)?
        } else if is_const {
            let got = self.cur().kind;
            self.error(format!("expected =, got {got}"));
            return None;
        } else {
            Expr::Literal(Value::nil())
        };
        Some(Stmt::VarDecl {
            binding,
            value,
            is_const,
        })
    }

    pub(super) fn parse_name(&mut self) -> Option<Arc<str>> {
        let tok = self.expect(TokenKind::Identifier)?;
        Some(Arc::from(tok.text))
    }

    /// `open name (, name)* close`, trailing comma allowed.
    pub(super) fn parse_name_list(&mut self, open: TokenKind, close: TokenKind) -> Option<Vec<Arc<str>>> {
        self.expect(open)?;
        let mut names = Vec::new();
        while !self.at(close) {
            names.push(self.parse_name()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Some(names)
    }

    fn parse_return(&mut self) -> Option<Stmt> {
        self.bump();
        if matches!(
            self.cur().kind,
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        ) {
            return Some(Stmt::Return(None));
        }
        self.parse_expression(Precedence::Lowest).map(|e| Stmt::Return(Some(e)))
    }

    /// `for (x in xs) body` or `for x in xs body`.
    fn parse_for_in(&mut self) -> Option<Stmt> {
        self.bump();
        let parenthesized = self.eat(TokenKind::LParen);
        let item = self.parse_name()?;
        self.expect(TokenKind::In)?;
        let iterable = self.parse_expression(Precedence::Lowest)?;
        if parenthesized {
            self.expect(TokenKind::RParen)?;
        }
        let body = self.parse_block()?;
        Some(Stmt::ForIn { item, iterable, body })
    }

    /// Operand of `defer`/`go`. A call is wrapped into a zero-parameter
    /// closure so it runs later rather than now.
    fn parse_deferred_operand(&mut self) -> Option<Expr> {
        let expr = self.parse_expression(Precedence::Lowest)?;
        if !expr.is_call() {
            return Some(expr);
        }
        let id = self.alloc_fn_id();
        Some(Expr::Function(FunctionLiteral {
            id,
            params: Vec::new(),
            body: Block::new(vec![Stmt::Expr(expr)]),
        }))
    }
}
