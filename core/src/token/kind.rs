use std::fmt;

use once_cell::sync::Lazy;

use crate::util::{FastHashMap, fast_hash_map_with_capacity};
use crate::val::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof,
    Illegal,

    Identifier,
    Number,
    String,
    Template,

    // Keywords
    Let,
    Const,
    If,
    Else,
    Return,
    For,
    In,
    Defer,
    Go,
    True,
    False,
    Null,

    // Operators
    Assign,       // =
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    Bang,         // !
    Equal,        // ==
    NotEqual,     // !=
    Less,         // <
    Greater,      // >
    LessEqual,    // <=
    GreaterEqual, // >=
    And,          // &&
    Or,           // ||
    Nullish,      // ??
    Arrow,        // =>
    Dot,          // .
    Comma,        // ,
    Colon,        // :
    Semicolon,    // ;
    Question,     // ?
    LParen,       // (
    RParen,       // )
    LBrace,       // {
    RBrace,       // }
    LBracket,     // [
    RBracket,     // ]
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        use TokenKind::*;
        match self {
            Eof => "EOF",
            Illegal => "ILLEGAL",
            Identifier => "IDENT",
            Number => "NUMBER",
            String => "STRING",
            Template => "TEMPLATE",
            Let => "let",
            Const => "const",
            If => "if",
            Else => "else",
            Return => "return",
            For => "for",
            In => "in",
            Defer => "defer",
            Go => "go",
            True => "true",
            False => "false",
            Null => "null",
            Assign => "=",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Bang => "!",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            Greater => ">",
            LessEqual => "<=",
            GreaterEqual => ">=",
            And => "&&",
            Or => "||",
            Nullish => "??",
            Arrow => "=>",
            Dot => ".",
            Comma => ",",
            Colon => ":",
            Semicolon => ";",
            Question => "?",
            LParen => "(",
            RParen => ")",
            LBrace => "{",
            RBrace => "}",
            LBracket => "[",
            RBracket => "]",
        }
    }

    pub fn is_keyword(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Let | Const | If | Else | Return | For | In | Defer | Go | True | False | Null
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Keyword -> (kind, interned value). Built once, read-only afterwards.
static KEYWORDS: Lazy<FastHashMap<&'static str, (TokenKind, Value)>> = Lazy::new(|| {
    use TokenKind::*;
    let mut table = fast_hash_map_with_capacity(12);
    for kind in [Let, Const, If, Else, Return, For, In, Defer, Go] {
        table.insert(kind.as_str(), (kind, Value::string(kind.as_str())));
    }
    table.insert("true", (True, Value::bool(true)));
    table.insert("false", (False, Value::bool(false)));
    table.insert("null", (Null, Value::nil()));
    table
});

/// Keyword kind and its pre-built value, if `ident` is reserved.
#[inline]
pub fn lookup_keyword(ident: &str) -> Option<&'static (TokenKind, Value)> {
    KEYWORDS.get(ident)
}
