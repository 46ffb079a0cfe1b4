use crate::val::Value;

use super::class::{CharClass, class, is_ident_continue};
use super::kind::{TokenKind, lookup_keyword};

/// One lexeme. `text` borrows the source; `value` carries the literal (or
/// identifier name) so the parser never re-derives it.
#[derive(Debug, Clone)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub offset: usize,
    pub text: &'src str,
    pub value: Value,
}

impl<'src> Token<'src> {
    #[inline]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[inline]
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Pull-based scanner over a borrowed source buffer.
pub struct Lexer<'src> {
    src: &'src str,
    bytes: &'src [u8],
    /// Offset of `ch`.
    pos: usize,
    /// Offset of the byte after `ch`.
    read: usize,
    /// Current byte; 0 once the input is exhausted.
    ch: u8,
    done: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        let mut lexer = Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            read: 0,
            ch: 0,
            done: false,
        };
        lexer.advance();
        lexer
    }

    pub fn source(&self) -> &'src str {
        self.src
    }

    #[inline]
    fn advance(&mut self) {
        self.ch = self.bytes.get(self.read).copied().unwrap_or(0);
        self.pos = self.read;
        if self.read < self.bytes.len() {
            self.read += 1;
        }
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    #[inline]
    fn peek(&self) -> u8 {
        self.bytes.get(self.read).copied().unwrap_or(0)
    }

    fn skip_trivia(&mut self) {
        loop {
            while !self.at_end() && class(self.ch) == CharClass::Space {
                self.advance();
            }
            if self.ch == b'/' && self.peek() == b'/' {
                while !self.at_end() && self.ch != b'\n' {
                    self.advance();
                }
                continue;
            }
            break;
        }
    }

    fn token(&self, kind: TokenKind, start: usize, value: Value) -> Token<'src> {
        Token {
            kind,
            offset: start,
            text: &self.src[start..self.pos],
            value,
        }
    }

    /// Scans the next token. Once the input is exhausted every call yields
    /// `Eof`.
    pub fn next_token(&mut self) -> Token<'src> {
        self.skip_trivia();
        let start = self.pos;
        if self.at_end() {
            return Token {
                kind: TokenKind::Eof,
                offset: start,
                text: "",
                value: Value::nil(),
            };
        }
        match class(self.ch) {
            CharClass::Alpha => self.scan_identifier(start),
            CharClass::Digit => self.scan_number(start),
            CharClass::Quote => self.scan_string(start),
            CharClass::Operator => self.scan_operator(start),
            CharClass::Space | CharClass::Other => self.illegal(start),
        }
    }

    fn illegal(&mut self, start: usize) -> Token<'src> {
        // Step over a whole UTF-8 sequence so `text` stays on a char boundary.
        self.advance();
        while !self.at_end() && !self.src.is_char_boundary(self.pos) {
            self.advance();
        }
        let text = &self.src[start..self.pos];
        self.token(TokenKind::Illegal, start, Value::string(text))
    }

    fn scan_identifier(&mut self, start: usize) -> Token<'src> {
        while !self.at_end() && is_ident_continue(self.ch) {
            self.advance();
        }
        let text = &self.src[start..self.pos];
        match lookup_keyword(text) {
            Some((kind, value)) => self.token(*kind, start, value.clone()),
            None => self.token(TokenKind::Identifier, start, Value::string(text)),
        }
    }

    fn scan_number(&mut self, start: usize) -> Token<'src> {
        while !self.at_end() && (self.ch.is_ascii_digit() || self.ch == b'.') {
            self.advance();
        }
        let text = &self.src[start..self.pos];
        let value = match text.parse::<f64>() {
            Ok(n) => Value::number(n),
            Err(_) => Value::invalid_because(format!("malformed number '{text}'")),
        };
        self.token(TokenKind::Number, start, value)
    }

    fn scan_string(&mut self, start: usize) -> Token<'src> {
        let quote = self.ch;
        self.advance();
        let body = self.pos;
        while !self.at_end() && self.ch != quote {
            self.advance();
        }
        if self.at_end() {
            return self.token(
                TokenKind::Illegal,
                start,
                Value::invalid_because("unterminated string"),
            );
        }
        let content = &self.src[body..self.pos];
        self.advance();
        let kind = if quote == b'`' {
            TokenKind::Template
        } else {
            TokenKind::String
        };
        self.token(kind, start, Value::string(content))
    }

    fn scan_operator(&mut self, start: usize) -> Token<'src> {
        use TokenKind::*;
        let first = self.ch;
        let second = self.peek();
        let pair = match (first, second) {
            (b'=', b'=') => Some(Equal),
            (b'!', b'=') => Some(NotEqual),
            (b'>', b'=') => Some(GreaterEqual),
            (b'<', b'=') => Some(LessEqual),
            (b'&', b'&') => Some(And),
            (b'|', b'|') => Some(Or),
            (b'=', b'>') => Some(Arrow),
            (b'?', b'?') => Some(Nullish),
            _ => None,
        };
        if let Some(kind) = pair {
            self.advance();
            self.advance();
            return self.token(kind, start, Value::string(kind.as_str()));
        }
        let kind = match first {
            b'=' => Assign,
            b'+' => Plus,
            b'-' => Minus,
            b'*' => Star,
            b'/' => Slash,
            b'%' => Percent,
            b'!' => Bang,
            b'<' => Less,
            b'>' => Greater,
            b'.' => Dot,
            b',' => Comma,
            b':' => Colon,
            b';' => Semicolon,
            b'?' => Question,
            b'(' => LParen,
            b')' => RParen,
            b'{' => LBrace,
            b'}' => RBrace,
            b'[' => LBracket,
            b']' => RBracket,
            // Lone `&`, `|` and `^`.
            _ => return self.illegal(start),
        };
        self.advance();
        self.token(kind, start, Value::string(kind.as_str()))
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token<'src>;

    /// Yields every token including a single trailing `Eof`.
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let tok = self.next_token();
        if tok.kind == TokenKind::Eof {
            self.done = true;
        }
        Some(tok)
    }
}

/// Lexes the whole source, `Eof` included.
pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    Lexer::new(src).collect()
}
