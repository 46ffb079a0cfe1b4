use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::util::{NameMap, fast_hash_map_new};

use super::{Callable, Kind, Lambda, NativeFn, ProxyHandler, Record};

pub type ArrayRef = Arc<RwLock<Vec<Value>>>;
pub type MapRef = Arc<RwLock<NameMap<Value>>>;

#[derive(Clone, Default)]
pub(crate) enum Payload {
    #[default]
    Empty,
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    Array(ArrayRef),
    Map(MapRef),
    Func(Arc<Callable>),
    Record(Arc<dyn Record>),
    Proxy(Arc<dyn ProxyHandler>),
    Any(Arc<dyn Any + Send + Sync>),
    Boxed(Arc<Value>),
}

/// The universal runtime datum.
///
/// Scalars (`Kind::is_scalar`) live in `num` alone: booleans as 0/1, times as
/// unix nanoseconds, durations as nanoseconds. Reference kinds keep their data
/// behind an `Arc`, so cloning a map or array value aliases the container.
#[derive(Clone)]
pub struct Value {
    kind: Kind,
    num: f64,
    pub(crate) payload: Payload,
}

impl Default for Value {
    fn default() -> Self {
        Self::nil()
    }
}

impl Value {
    #[inline]
    const fn scalar(kind: Kind, num: f64) -> Self {
        Self {
            kind,
            num,
            payload: Payload::Empty,
        }
    }

    #[inline]
    fn with_payload(kind: Kind, payload: Payload) -> Self {
        Self { kind, num: 0.0, payload }
    }

    #[inline]
    pub const fn nil() -> Self {
        Self::scalar(Kind::Nil, 0.0)
    }

    #[inline]
    pub const fn invalid() -> Self {
        Self::scalar(Kind::Invalid, 0.0)
    }

    /// Invalid value carrying a human-readable reason.
    pub fn invalid_because(reason: impl Into<String>) -> Self {
        let reason: String = reason.into();
        Self::with_payload(Kind::Invalid, Payload::Str(reason.into()))
    }

    #[inline]
    pub const fn number(n: f64) -> Self {
        Self::scalar(Kind::Number, n)
    }

    #[inline]
    pub const fn bool(b: bool) -> Self {
        Self::scalar(Kind::Bool, if b { 1.0 } else { 0.0 })
    }

    #[inline]
    pub const fn time_nanos(nanos: f64) -> Self {
        Self::scalar(Kind::Time, nanos)
    }

    #[inline]
    pub const fn duration_nanos(nanos: f64) -> Self {
        Self::scalar(Kind::Duration, nanos)
    }

    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::with_payload(Kind::String, Payload::Str(s.into()))
    }

    pub fn bytes(b: impl Into<Arc<[u8]>>) -> Self {
        Self::with_payload(Kind::Bytes, Payload::Bytes(b.into()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Self::with_payload(Kind::Array, Payload::Array(Arc::new(RwLock::new(items))))
    }

    pub fn map(entries: NameMap<Value>) -> Self {
        Self::with_payload(Kind::Map, Payload::Map(Arc::new(RwLock::new(entries))))
    }

    pub fn empty_map() -> Self {
        Self::map(fast_hash_map_new())
    }

    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<Arc<str>>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut entries = fast_hash_map_new();
        for (k, v) in pairs {
            entries.insert(k.into(), v);
        }
        Self::map(entries)
    }

    pub fn callable(c: Callable) -> Self {
        Self::with_payload(Kind::Func, Payload::Func(Arc::new(c)))
    }

    pub fn native<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        let f: NativeFn = Arc::new(f);
        Self::callable(Callable::Native(f))
    }

    pub fn lambda(l: Lambda) -> Self {
        Self::callable(Callable::Lambda(l))
    }

    pub fn record(r: Arc<dyn Record>) -> Self {
        Self::with_payload(Kind::Struct, Payload::Record(r))
    }

    pub fn proxy(p: Arc<dyn ProxyHandler>) -> Self {
        Self::with_payload(Kind::Proxy, Payload::Proxy(p))
    }

    pub fn any(a: Arc<dyn Any + Send + Sync>) -> Self {
        Self::with_payload(Kind::Any, Payload::Any(a))
    }

    /// Wraps a value travelling out of a `return` in the tree-walk evaluator.
    pub fn returned(v: Value) -> Self {
        Self::with_payload(Kind::Return, Payload::Boxed(Arc::new(v)))
    }

    #[inline]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Numeric slot. Meaningful for scalar kinds only.
    #[inline]
    pub fn num(&self) -> f64 {
        self.num
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        self.kind == Kind::Nil
    }

    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.kind == Kind::Invalid
    }

    /// Nil or Invalid.
    #[inline]
    pub fn is_blank(&self) -> bool {
        matches!(self.kind, Kind::Nil | Kind::Invalid)
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        self.kind == Kind::Number
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        self.kind == Kind::String
    }

    /// A reference kind with its payload populated.
    #[inline]
    pub fn is_object(&self) -> bool {
        !self.kind.is_scalar() && !matches!(self.payload, Payload::Empty)
    }

    pub fn invalid_reason(&self) -> Option<&str> {
        match (&self.kind, &self.payload) {
            (Kind::Invalid, Payload::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match (&self.kind, &self.payload) {
            (Kind::String, Payload::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_arc_str(&self) -> Option<&Arc<str>> {
        match (&self.kind, &self.payload) {
            (Kind::String, Payload::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match &self.payload {
            Payload::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match &self.payload {
            Payload::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Arc<Callable>> {
        match &self.payload {
            Payload::Func(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_lambda(&self) -> Option<&Lambda> {
        self.as_callable().and_then(|c| c.as_lambda())
    }

    pub fn as_record(&self) -> Option<&Arc<dyn Record>> {
        match &self.payload {
            Payload::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Arc<dyn ProxyHandler>> {
        match &self.payload {
            Payload::Proxy(p) => Some(p),
            _ => None,
        }
    }

    pub fn downcast_any<T: Any + Send + Sync>(&self) -> Option<&T> {
        match &self.payload {
            Payload::Any(a) => a.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Strips one `Return` wrapper, if any.
    pub fn unwrap_return(self) -> Value {
        match (&self.kind, &self.payload) {
            (Kind::Return, Payload::Boxed(inner)) => inner.as_ref().clone(),
            _ => self,
        }
    }

    #[inline]
    pub fn as_f64(&self) -> f64 {
        self.num
    }

    #[inline]
    pub fn as_i64(&self) -> i64 {
        self.num as i64
    }

    /// Address of an array or map payload; nested walks track these to spot cycles.
    pub(crate) fn container_addr(&self) -> Option<usize> {
        match &self.payload {
            Payload::Array(a) => Some(Arc::as_ptr(a) as *const () as usize),
            Payload::Map(m) => Some(Arc::as_ptr(m) as *const () as usize),
            _ => None,
        }
    }

    /// Identity of the shared payload, used by equality for opaque kinds.
    pub(crate) fn same_payload(&self, other: &Value) -> bool {
        match (&self.payload, &other.payload) {
            (Payload::Empty, Payload::Empty) => true,
            (Payload::Str(a), Payload::Str(b)) => Arc::ptr_eq(a, b),
            (Payload::Bytes(a), Payload::Bytes(b)) => Arc::ptr_eq(a, b),
            (Payload::Array(a), Payload::Array(b)) => Arc::ptr_eq(a, b),
            (Payload::Map(a), Payload::Map(b)) => Arc::ptr_eq(a, b),
            (Payload::Func(a), Payload::Func(b)) => Arc::ptr_eq(a, b),
            (Payload::Record(a), Payload::Record(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Payload::Proxy(a), Payload::Proxy(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Payload::Any(a), Payload::Any(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Payload::Boxed(a), Payload::Boxed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::String => write!(f, "{:?}", self.as_str().unwrap_or_default()),
            Kind::Invalid => match self.invalid_reason() {
                Some(reason) => write!(f, "invalid({reason})"),
                None => f.write_str("invalid"),
            },
            Kind::Func => match self.as_callable() {
                Some(c) => c.fmt(f),
                None => f.write_str("<function>"),
            },
            _ => write!(f, "{}", self.text()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}
