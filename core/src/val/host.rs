use super::{CompareOp, Value};

/// Host record exposed to scripts as a `struct` value.
///
/// Field and method tables are fixed by the implementor; nothing is discovered
/// through introspection at runtime.
pub trait Record: Send + Sync {
    fn type_name(&self) -> &str;

    fn get_field(&self, name: &str) -> Option<Value>;

    fn has_method(&self, _name: &str) -> bool {
        false
    }

    fn call_method(&self, name: &str, _args: &[Value]) -> Value {
        Value::invalid_because(format!("{} has no method '{}'", self.type_name(), name))
    }

    /// JSON form used by `Value::to_json`. Defaults to an opaque marker.
    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::String(format!("<{}>", self.type_name()))
    }
}

/// Delegate for `proxy` values. Member access, comparisons and method calls on
/// the proxy are forwarded here untouched, which lets a host build symbolic
/// DSLs (e.g. capturing `user.age > 18` as a query predicate).
pub trait ProxyHandler: Send + Sync {
    fn on_get(&self, key: &str) -> Value;

    /// `op` is already oriented so that the proxy is the left operand.
    fn on_compare(&self, op: CompareOp, other: &Value) -> Value;

    fn on_invoke(&self, method: &str, args: &[Value]) -> Value;
}
