use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminant of a [`Value`](super::Value).
///
/// The declaration order matters: every kind up to and including `Duration`
/// is a scalar that lives entirely in the numeric slot, everything after it
/// carries a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Kind {
    Invalid = 0,
    Nil,
    Number,
    Bool,
    Time,
    Duration,
    String,
    Bytes,
    Map,
    Array,
    Struct,
    Func,
    Any,
    Return,
    Proxy,
}

impl Kind {
    pub const COUNT: usize = 15;

    pub const ALL: [Kind; Kind::COUNT] = [
        Kind::Invalid,
        Kind::Nil,
        Kind::Number,
        Kind::Bool,
        Kind::Time,
        Kind::Duration,
        Kind::String,
        Kind::Bytes,
        Kind::Map,
        Kind::Array,
        Kind::Struct,
        Kind::Func,
        Kind::Any,
        Kind::Return,
        Kind::Proxy,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Kind::Invalid => "invalid",
            Kind::Nil => "nil",
            Kind::Number => "number",
            Kind::Bool => "bool",
            Kind::Time => "time",
            Kind::Duration => "duration",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::Map => "map",
            Kind::Array => "array",
            Kind::Struct => "struct",
            Kind::Func => "func",
            Kind::Any => "any",
            Kind::Return => "return",
            Kind::Proxy => "proxy",
        }
    }

    /// Scalar kinds keep their whole state in the numeric slot.
    #[inline]
    pub const fn is_scalar(self) -> bool {
        (self as u8) <= (Kind::Duration as u8)
    }

    /// Kinds that take part in numeric ordering.
    #[inline]
    pub const fn is_ordered_scalar(self) -> bool {
        matches!(self, Kind::Number | Kind::Bool | Kind::Time | Kind::Duration)
    }

    #[inline]
    pub const fn is_container(self) -> bool {
        matches!(self, Kind::Map | Kind::Array)
    }

    pub fn from_name(name: &str) -> Option<Kind> {
        Kind::ALL.iter().copied().find(|k| k.name() == name)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
