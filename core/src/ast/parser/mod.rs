use crate::token::{ParseError, Position, Token, TokenKind, tokenize};

use super::Program;

mod expr;
mod stmt;

/// Binding power of infix operators, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Precedence {
    Lowest,
    Assign,
    Or,
    And,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
    Member,
    Arrow,
}

impl Precedence {
    /// One step weaker. Used for right-associative operators.
    fn weaker(self) -> Self {
        use Precedence::*;
        match self {
            Lowest | Assign => Lowest,
            Or => Assign,
            And => Or,
            Equals => And,
            LessGreater => Equals,
            Sum => LessGreater,
            Product => Sum,
            Prefix => Product,
            Call => Prefix,
            Index => Call,
            Member => Index,
            Arrow => Member,
        }
    }
}

pub(crate) fn infix_precedence(kind: TokenKind) -> Precedence {
    use TokenKind::*;
    match kind {
        Assign => Precedence::Assign,
        Or | Nullish => Precedence::Or,
        And => Precedence::And,
        Equal | NotEqual => Precedence::Equals,
        Less | Greater | LessEqual | GreaterEqual => Precedence::LessGreater,
        Plus | Minus => Precedence::Sum,
        Star | Slash | Percent => Precedence::Product,
        LParen => Precedence::Call,
        LBracket => Precedence::Index,
        Dot => Precedence::Member,
        Arrow => Precedence::Arrow,
        _ => Precedence::Lowest,
    }
}

/// Deepest nesting of expressions and blocks a program may use. Each nested
/// operand, group, block or chained operator counts one level.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Precedence-climbing parser over a pre-lexed token buffer.
///
/// Errors are collected rather than returned; a subtree that failed to parse
/// is simply missing from the result. Callers must check [`Parser::errors`]
/// before using the program.
pub struct Parser<'src> {
    src: &'src str,
    tokens: Vec<Token<'src>>,
    pos: usize,
    errors: Vec<ParseError>,
    next_fn_id: usize,
    depth: usize,
    // Set once the nesting limit is hit; parsing stops and no further errors are recorded.
    abandoned: bool,
}

impl<'src> Parser<'src> {
    pub fn new(src: &'src str) -> Self {
        Self::with_fn_base(src, 0)
    }

    /// Function literal ids start at `base`; template sub-parsers continue
    /// the numbering of their parent.
    pub(crate) fn with_fn_base(src: &'src str, base: usize) -> Self {
        Self {
            src,
            tokens: tokenize(src),
            pos: 0,
            errors: Vec::new(),
            next_fn_id: base,
            depth: 0,
            abandoned: false,
        }
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        while !self.at(TokenKind::Eof) {
            let before = self.pos;
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            if self.pos == before {
                // No progress after an error: skip the offending token.
                self.pos += 1;
            }
        }
        Program {
            statements,
            fn_count: self.next_fn_id,
        }
    }

    #[inline]
    fn cur(&self) -> &Token<'src> {
        // The buffer always ends with Eof and `pos` never passes it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    #[inline]
    fn peek_kind(&self, ahead: usize) -> TokenKind {
        self.tokens
            .get(self.pos + ahead)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    #[inline]
    fn at(&self, kind: TokenKind) -> bool {
        self.cur().kind == kind
    }

    fn bump(&mut self) -> Token<'src> {
        let tok = self.cur().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    /// Consumes `kind` if it is next.
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Option<Token<'src>> {
        if self.at(kind) {
            return Some(self.bump());
        }
        let got = self.cur().kind;
        self.error(format!("expected {kind}, got {got}"));
        None
    }

    fn error(&mut self, message: String) {
        if self.abandoned {
            return;
        }
        let offset = self.cur().offset;
        self.errors.push(ParseError::at(message, Position::locate(self.src, offset)));
    }

    /// Enters one nesting level. Past the limit, records an error and skips
    /// to the end of input.
    fn descend(&mut self) -> Option<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            self.error(format!("expression nested too deeply (limit {MAX_NESTING_DEPTH})"));
            self.abandoned = true;
            self.pos = self.tokens.len() - 1;
            return None;
        }
        self.depth += 1;
        Some(())
    }

    fn alloc_fn_id(&mut self) -> usize {
        let id = self.next_fn_id;
        self.next_fn_id += 1;
        id
    }
}

/// Lexes and parses `src`, returning the program or every error found.
pub fn parse(src: &str) -> Result<Program, Vec<ParseError>> {
    let mut parser = Parser::new(src);
    let program = parser.parse_program();
    if parser.errors.is_empty() {
        Ok(program)
    } else {
        Err(parser.errors)
    }
}
