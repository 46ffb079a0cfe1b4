use std::sync::Arc;

use kit_core::module::Module;
use kit_core::util::{NameMap, fast_hash_map_new};
use kit_core::val::{Kind, Value};

#[derive(Debug, Default)]
pub struct JsonModule;

impl JsonModule {
    pub fn new() -> Self {
        Self
    }

    /// `json.parse(text)`; malformed input yields Invalid.
    fn parse(args: &[Value]) -> Value {
        let Some(text) = args.first().and_then(Value::as_str) else {
            return Value::invalid_because("json.parse expects a string");
        };
        match Value::from_json_str(text) {
            Ok(v) => v,
            Err(e) => Value::invalid_because(format!("json.parse: {}", e)),
        }
    }

    /// `json.stringify(value, pretty?)`.
    fn stringify(args: &[Value]) -> Value {
        let Some(v) = args.first() else {
            return Value::string("null");
        };
        if v.kind() == Kind::Invalid {
            return v.clone();
        }
        let pretty = args.get(1).is_some_and(Value::truthy);
        match v.encode_json(pretty) {
            Ok(text) => Value::string(text),
            Err(e) => Value::invalid_because(format!("json.stringify: {e}")),
        }
    }
}

impl Module for JsonModule {
    fn name(&self) -> &str {
        "json"
    }

    fn description(&self) -> &str {
        "JSON encoding and decoding"
    }

    fn exports(&self) -> NameMap<Value> {
        let mut exports = fast_hash_map_new();
        exports.insert(Arc::from("parse"), Value::native(Self::parse));
        exports.insert(Arc::from("stringify"), Value::native(Self::stringify));
        exports
    }
}
