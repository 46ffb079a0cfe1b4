mod class;
mod error;
mod kind;
mod lexer;

pub use class::{CharClass, class, is_ident_continue};
pub use error::{ParseError, Position};
pub use kind::{TokenKind, lookup_keyword};
pub use lexer::{Lexer, Token, tokenize};
