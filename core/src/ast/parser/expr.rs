use std::sync::Arc;

use crate::ast::{Block, Expr, FunctionLiteral, Stmt, TemplatePart};
use crate::token::{ParseError, Position, Token, TokenKind};
use crate::val::Value;

use super::{Parser, Precedence, infix_precedence};

impl<'src> Parser<'src> {
    pub(crate) fn parse_expression(&mut self, prec: Precedence) -> Option<Expr> {
        let entry = self.depth;
        let expr = self.parse_nested_expression(prec);
        self.depth = entry;
        expr
    }

    /// Every operator folded into `left` deepens the tree, so each one
    /// takes a nesting level as well.
    fn parse_nested_expression(&mut self, prec: Precedence) -> Option<Expr> {
        self.descend()?;
        let mut left = self.parse_prefix()?;
        while !self.at(TokenKind::Semicolon) && prec < infix_precedence(self.cur().kind) {
            self.descend()?;
            left = self.parse_infix(left)?;
        }
        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expr> {
        use TokenKind::*;
        let kind = self.cur().kind;
        match kind {
            Identifier => {
                let tok = self.bump();
                Some(Expr::Identifier(Arc::from(tok.text)))
            }
            Number => {
                let tok = self.bump();
                if tok.value.is_invalid() {
                    self.error_at(tok.offset, format!("invalid number literal '{}'", tok.text));
                    return None;
                }
                Some(Expr::Literal(tok.value))
            }
            String | True | False | Null => Some(Expr::Literal(self.bump().value)),
            Template => {
                let tok = self.bump();
                self.parse_template(&tok)
            }
            Bang | Minus => {
                let op = self.bump().kind;
                let right = self.parse_expression(Precedence::Prefix)?;
                Some(Expr::Prefix {
                    op,
                    right: Box::new(right),
                })
            }
            LParen => self.parse_group(),
            LBracket => {
                self.bump();
                self.parse_expr_list(RBracket).map(Expr::Array)
            }
            LBrace => self.parse_object(),
            If => self.parse_if(),
            Illegal => {
                let tok = self.bump();
                let message = match tok.value.invalid_reason() {
                    Some(reason) => reason.to_string(),
                    None => format!("illegal token '{}'", tok.text),
                };
                self.error_at(tok.offset, message);
                None
            }
            kind => {
                self.error(format!("no prefix parse function for {kind}"));
                if kind != Eof {
                    self.bump();
                }
                None
            }
        }
    }

    fn parse_infix(&mut self, left: Expr) -> Option<Expr> {
        use TokenKind::*;
        let kind = self.cur().kind;
        match kind {
            LParen => {
                self.bump();
                let args = self.parse_expr_list(RParen)?;
                Some(Expr::Call {
                    callee: Box::new(left),
                    args,
                })
            }
            LBracket => {
                self.bump();
                let index = self.parse_expression(Precedence::Lowest)?;
                self.expect(RBracket)?;
                Some(Expr::Index {
                    object: Box::new(left),
                    index: Box::new(index),
                })
            }
            Dot => self.parse_member(left),
            Assign => {
                if !matches!(left, Expr::Identifier(_) | Expr::Member { .. } | Expr::Index { .. }) {
                    self.error(format!("invalid assignment target {left}"));
                    return None;
                }
                self.bump();
                let value = self.parse_expression(Precedence::Assign.weaker())?;
                Some(Expr::Assign {
                    target: Box::new(left),
                    value: Box::new(value),
                })
            }
            Arrow => self.parse_arrow(left),
            op => {
                self.bump();
                let right = self.parse_expression(infix_precedence(op))?;
                Some(Expr::Infix {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                })
            }
        }
    }

    /// `.name` or `.name(args)`. Keywords are accepted as property names.
    fn parse_member(&mut self, object: Expr) -> Option<Expr> {
        self.bump();
        let tok = self.cur().clone();
        if tok.kind != TokenKind::Identifier && !tok.kind.is_keyword() {
            self.error(format!("expected {}, got {}", TokenKind::Identifier, tok.kind));
            return None;
        }
        self.bump();
        let name: Arc<str> = Arc::from(tok.text);
        if self.eat(TokenKind::LParen) {
            let args = self.parse_expr_list(TokenKind::RParen)?;
            return Some(Expr::MethodCall {
                object: Box::new(object),
                method: name,
                args,
            });
        }
        Some(Expr::Member {
            object: Box::new(object),
            property: name,
        })
    }

    /// `(expr)`, or a parameter list when the matching `)` is followed by `=>`.
    fn parse_group(&mut self) -> Option<Expr> {
        if self.group_precedes_arrow() {
            return self
                .parse_name_list(TokenKind::LParen, TokenKind::RParen)
                .map(Expr::Params);
        }
        self.bump();
        let inner = self.parse_expression(Precedence::Lowest)?;
        self.expect(TokenKind::RParen)?;
        Some(inner)
    }

    /// Parameter lists hold only names and commas, so the scan stops at the
    /// first other token.
    fn group_precedes_arrow(&self) -> bool {
        for (i, tok) in self.tokens[self.pos + 1..].iter().enumerate() {
            match tok.kind {
                TokenKind::Identifier | TokenKind::Comma => {}
                TokenKind::RParen => return self.peek_kind(i + 2) == TokenKind::Arrow,
                _ => return false,
            }
        }
        false
    }

    fn parse_arrow(&mut self, left: Expr) -> Option<Expr> {
        let params = match left {
            Expr::Identifier(name) => vec![name],
            Expr::Params(names) => names,
            other => {
                self.error(format!("invalid arrow parameters {other}"));
                return None;
            }
        };
        self.bump();
        let id = self.alloc_fn_id();
        let body = if self.at(TokenKind::LBrace) {
            self.parse_block()?
        } else {
            let value = self.parse_expression(Precedence::Lowest)?;
            Block::new(vec![Stmt::Return(Some(value))])
        };
        Some(Expr::Function(FunctionLiteral { id, params, body }))
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_expr_list(&mut self, close: TokenKind) -> Option<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.at(close) {
            items.push(self.parse_expression(Precedence::Lowest)?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Some(items)
    }

    fn parse_object(&mut self) -> Option<Expr> {
        use TokenKind::*;
        self.bump();
        let mut pairs = Vec::new();
        while !self.at(RBrace) {
            let tok = self.cur().clone();
            let key = match tok.kind {
                Identifier if matches!(self.peek_kind(1), Comma | RBrace) => {
                    // Shorthand `{a}` means `{a: a}`.
                    self.bump();
                    let name: Arc<str> = Arc::from(tok.text);
                    pairs.push((Expr::Literal(Value::string(name.clone())), Expr::Identifier(name)));
                    if !self.eat(Comma) {
                        break;
                    }
                    continue;
                }
                Identifier => {
                    self.bump();
                    Expr::Literal(Value::string(tok.text))
                }
                kind if kind.is_keyword() && self.peek_kind(1) == Colon => {
                    self.bump();
                    Expr::Literal(Value::string(tok.text))
                }
                LBracket => {
                    self.bump();
                    let key = self.parse_expression(Precedence::Lowest)?;
                    self.expect(RBracket)?;
                    key
                }
                _ => self.parse_expression(Precedence::Lowest)?,
            };
            self.expect(Colon)?;
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));
            if !self.eat(Comma) {
                break;
            }
        }
        self.expect(RBrace)?;
        Some(Expr::Object(pairs))
    }

    fn parse_if(&mut self) -> Option<Expr> {
        self.bump();
        let condition = self.parse_expression(Precedence::Lowest)?;
        let consequence = self.parse_branch()?;
        let alternative = if self.eat(TokenKind::Else) {
            Some(self.parse_branch()?)
        } else {
            None
        };
        Some(Expr::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    /// Splits a template body into text and `${expr}` parts; each expression
    /// is parsed by a nested parser.
    fn parse_template(&mut self, tok: &Token<'src>) -> Option<Expr> {
        let raw: Arc<str> = tok.value.as_arc_str().cloned().unwrap_or_else(|| Arc::from(""));
        let mut parts = Vec::new();
        let mut rest = &raw[..];
        while let Some(open) = rest.find("${") {
            if open > 0 {
                parts.push(TemplatePart::Text(Arc::from(&rest[..open])));
            }
            let body = open + 2;
            let mut depth = 1usize;
            let mut close = None;
            for (i, b) in rest.as_bytes()[body..].iter().enumerate() {
                match b {
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            close = Some(body + i);
                            break;
                        }
                    }
                    _ => {}
                }
            }
            let Some(close) = close else {
                self.error_at(tok.offset, "unterminated template expression".to_string());
                return None;
            };
            parts.push(TemplatePart::Expr(self.parse_template_expr(&rest[body..close], tok.offset)?));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            parts.push(TemplatePart::Text(Arc::from(rest)));
        }
        Some(Expr::Template(parts))
    }

    fn parse_template_expr(&mut self, inner: &str, offset: usize) -> Option<Expr> {
        let mut sub = Parser::with_fn_base(inner, self.next_fn_id);
        sub.depth = self.depth;
        let expr = sub.parse_expression(Precedence::Lowest);
        if expr.is_some() && !sub.at(TokenKind::Eof) {
            let got = sub.cur().kind;
            sub.error(format!("unexpected {got} in template expression"));
        }
        self.next_fn_id = sub.next_fn_id;
        if sub.errors.is_empty() {
            return expr;
        }
        for err in sub.errors {
            self.error_at(offset, format!("in template: {}", err.message));
        }
        None
    }

    pub(super) fn error_at(&mut self, offset: usize, message: String) {
        if self.abandoned {
            return;
        }
        self.errors.push(ParseError::at(message, Position::locate(self.src, offset)));
    }
}
