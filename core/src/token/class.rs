//! Byte classification driving the lexer's dispatch.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CharClass {
    Other = 0,
    Space,
    Alpha,
    Digit,
    Operator,
    Quote,
}

const OPERATOR_BYTES: &[u8] = b"=+-*/%&|^.!<>?:,;()[]{}";

const fn build_class_table() -> [CharClass; 256] {
    let mut table = [CharClass::Other; 256];
    let mut i = 0;
    while i < 256 {
        let c = i as u8;
        if c <= b' ' {
            table[i] = CharClass::Space;
        } else if c.is_ascii_alphabetic() || c == b'_' || c == b'$' {
            table[i] = CharClass::Alpha;
        } else if c.is_ascii_digit() {
            table[i] = CharClass::Digit;
        } else if c == b'"' || c == b'\'' || c == b'`' {
            table[i] = CharClass::Quote;
        }
        i += 1;
    }
    let mut j = 0;
    while j < OPERATOR_BYTES.len() {
        table[OPERATOR_BYTES[j] as usize] = CharClass::Operator;
        j += 1;
    }
    table
}

static CLASS_TABLE: [CharClass; 256] = build_class_table();

#[inline]
pub fn class(b: u8) -> CharClass {
    CLASS_TABLE[b as usize]
}

#[inline]
pub fn is_ident_continue(b: u8) -> bool {
    matches!(class(b), CharClass::Alpha | CharClass::Digit)
}
