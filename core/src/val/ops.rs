use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Rem, Sub};

use crate::util::read_lock;

use super::{Kind, Value};

const NUMBER_TOLERANCE: f64 = 1e-12;
const NANOS_PER_SECOND: f64 = 1e9;
const MAX_EQUALS_DEPTH: usize = 128;

/// Comparison requested by `COMPARE`; the operand byte is the discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompareOp {
    Eq = 0,
    Ne = 1,
    Gt = 2,
    Lt = 3,
    Ge = 4,
    Le = 5,
}

impl CompareOp {
    pub fn from_mode(mode: u8) -> Option<Self> {
        Some(match mode {
            0 => CompareOp::Eq,
            1 => CompareOp::Ne,
            2 => CompareOp::Gt,
            3 => CompareOp::Lt,
            4 => CompareOp::Ge,
            5 => CompareOp::Le,
            _ => return None,
        })
    }

    pub fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            "==" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            ">" => CompareOp::Gt,
            "<" => CompareOp::Lt,
            ">=" => CompareOp::Ge,
            "<=" => CompareOp::Le,
            _ => return None,
        })
    }

    #[inline]
    pub fn mode(self) -> u8 {
        self as u8
    }

    /// Symbol handed to proxy handlers.
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }

    /// The same relation with the operands swapped.
    pub fn flip(self) -> Self {
        match self {
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Ge => CompareOp::Le,
            CompareOp::Le => CompareOp::Ge,
            other => other,
        }
    }

    pub fn apply(self, a: &Value, b: &Value) -> bool {
        match self {
            CompareOp::Eq => a.equals(b),
            CompareOp::Ne => !a.equals(b),
            CompareOp::Gt => b.less(a),
            CompareOp::Lt => a.less(b),
            CompareOp::Ge => matches!(a.partial_cmp(b), Some(Ordering::Greater | Ordering::Equal)),
            CompareOp::Le => matches!(a.partial_cmp(b), Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Value {
    /// Scalars are truthy when their numeric slot is positive; reference
    /// kinds whenever their payload is present, so `[]` and `{}` are truthy.
    #[inline]
    pub fn truthy(&self) -> bool {
        if self.kind().is_scalar() {
            self.num() > 0.0
        } else {
            self.is_object()
        }
    }

    /// Deep equality. Numbers compare within `1e-12`; containers element-wise;
    /// functions, records, proxies and opaque values by identity. Distinct
    /// containers that recur inside themselves, or nest past
    /// `MAX_EQUALS_DEPTH`, compare unequal.
    pub fn equals(&self, other: &Value) -> bool {
        self.equals_within(other, &mut Vec::new())
    }

    fn equals_within(&self, other: &Value, open: &mut Vec<(usize, usize)>) -> bool {
        if self.kind() != other.kind() {
            return false;
        }
        match self.kind() {
            Kind::Number => (self.num() - other.num()).abs() < NUMBER_TOLERANCE,
            Kind::Bool | Kind::Time | Kind::Duration => self.num() == other.num(),
            Kind::Nil => true,
            Kind::Invalid => false,
            Kind::String => self.as_str() == other.as_str(),
            Kind::Bytes => self.as_bytes() == other.as_bytes(),
            Kind::Array | Kind::Map => {
                if self.same_payload(other) {
                    return true;
                }
                let (Some(l), Some(r)) = (self.container_addr(), other.container_addr()) else {
                    return false;
                };
                if open.len() >= MAX_EQUALS_DEPTH || open.contains(&(l, r)) {
                    return false;
                }
                open.push((l, r));
                let same = self.same_items(other, open);
                open.pop();
                same
            }
            _ => self.same_payload(other),
        }
    }

    fn same_items(&self, other: &Value, open: &mut Vec<(usize, usize)>) -> bool {
        if let (Some(a), Some(b)) = (self.as_array(), other.as_array()) {
            let (x, y) = (read_lock(a).clone(), read_lock(b).clone());
            return x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| l.equals_within(r, open));
        }
        if let (Some(a), Some(b)) = (self.as_map(), other.as_map()) {
            let (x, y) = (read_lock(a).clone(), read_lock(b).clone());
            return x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| v.equals_within(w, open)));
        }
        false
    }

    /// Strict ordering. Defined between ordered scalars (number, bool, time,
    /// duration) and between two strings; everything else is unordered.
    pub fn less(&self, other: &Value) -> bool {
        matches!(self.partial_cmp(other), Some(Ordering::Less))
    }

    fn extend(&self, other: &Value) -> Value {
        if self.is_invalid() || other.is_invalid() {
            return mismatch("add", self, other);
        }
        if self.is_string() || other.is_string() {
            let mut s = self.text();
            other.write_text(&mut s, &mut Vec::new());
            return Value::string(s);
        }
        if self.is_nil() {
            return other.clone();
        }
        if other.is_nil() {
            return self.clone();
        }
        match (self.kind(), other.kind()) {
            (Kind::Time, Kind::Duration) => Value::time_nanos(self.num() + other.num()),
            (Kind::Time, Kind::Number) => Value::time_nanos(self.num() + other.num() * NANOS_PER_SECOND),
            (Kind::Duration, Kind::Duration) => Value::duration_nanos(self.num() + other.num()),
            _ => mismatch("add", self, other),
        }
    }
}

/// An Invalid operand passes through with its reason; otherwise the kinds
/// are named.
fn mismatch(verb: &str, a: &Value, b: &Value) -> Value {
    if a.is_invalid() {
        return a.clone();
    }
    if b.is_invalid() {
        return b.clone();
    }
    Value::invalid_because(format!("cannot {verb} {} and {}", a.kind(), b.kind()))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.kind().is_ordered_scalar() && other.kind().is_ordered_scalar() {
            if self.kind() == other.kind() && self.equals(other) {
                return Some(Ordering::Equal);
            }
            return self.num().partial_cmp(&other.num());
        }
        match (self.as_str(), other.as_str()) {
            (Some(a), Some(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl Add for &Value {
    type Output = Value;

    #[inline]
    fn add(self, other: Self) -> Value {
        if self.is_number() && other.is_number() {
            return Value::number(self.num() + other.num());
        }
        self.extend(other)
    }
}

impl Sub for &Value {
    type Output = Value;

    #[inline]
    fn sub(self, other: Self) -> Value {
        match (self.kind(), other.kind()) {
            (Kind::Number, Kind::Number) => Value::number(self.num() - other.num()),
            (Kind::Time, Kind::Duration) => Value::time_nanos(self.num() - other.num()),
            (Kind::Time, Kind::Time) => Value::duration_nanos(self.num() - other.num()),
            (Kind::Duration, Kind::Duration) => Value::duration_nanos(self.num() - other.num()),
            _ => mismatch("subtract", self, other),
        }
    }
}

impl Mul for &Value {
    type Output = Value;

    #[inline]
    fn mul(self, other: Self) -> Value {
        if self.is_number() && other.is_number() {
            return Value::number(self.num() * other.num());
        }
        mismatch("multiply", self, other)
    }
}

impl Div for &Value {
    type Output = Value;

    /// Division by zero yields nil.
    #[inline]
    fn div(self, other: Self) -> Value {
        if self.is_number() && other.is_number() {
            if other.num() == 0.0 {
                return Value::nil();
            }
            return Value::number(self.num() / other.num());
        }
        mismatch("divide", self, other)
    }
}

impl Rem for &Value {
    type Output = Value;

    #[inline]
    fn rem(self, other: Self) -> Value {
        if self.is_number() && other.is_number() {
            if other.num() == 0.0 {
                return Value::nil();
            }
            return Value::number(self.num() % other.num());
        }
        mismatch("take the remainder of", self, other)
    }
}
