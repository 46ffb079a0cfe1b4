use std::cell::RefCell;
use std::fmt;

use anyhow::Result;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::util::{fast_hash_map_with_capacity, read_lock, sorted_keys};

use super::convert::{format_duration, format_time};
use super::{Kind, Value};

/// Containers nested deeper than this refuse to serialize.
pub const MAX_JSON_DEPTH: usize = 128;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let path = RefCell::new(Vec::new());
        Guarded { value: self, path: &path }.serialize(s)
    }
}

/// A value being serialized plus the containers currently open above it.
struct Guarded<'a> {
    value: &'a Value,
    path: &'a RefCell<Vec<usize>>,
}

/// Pops its container off the open path when dropped.
struct Visit<'a>(&'a RefCell<Vec<usize>>);

impl Drop for Visit<'_> {
    fn drop(&mut self) {
        self.0.borrow_mut().pop();
    }
}

impl<'a> Guarded<'a> {
    fn child<'b>(&'b self, value: &'b Value) -> Guarded<'b> {
        Guarded { value, path: self.path }
    }

    fn enter<E: ser::Error>(&self) -> Result<Visit<'a>, E> {
        let Some(addr) = self.value.container_addr() else {
            return Err(E::custom("not a container"));
        };
        let mut path = self.path.borrow_mut();
        if path.contains(&addr) {
            return Err(E::custom("cyclic value cannot be encoded as JSON"));
        }
        if path.len() >= MAX_JSON_DEPTH {
            return Err(E::custom(format!("value nested deeper than {MAX_JSON_DEPTH} levels")));
        }
        path.push(addr);
        Ok(Visit(self.path))
    }
}

impl Serialize for Guarded<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let v = self.value;
        match v.kind() {
            Kind::Invalid | Kind::Nil | Kind::Any => s.serialize_unit(),
            Kind::Bool => s.serialize_bool(v.num() > 0.0),
            Kind::Number => {
                let n = v.num();
                if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
                    s.serialize_i64(n as i64)
                } else if n.is_finite() {
                    s.serialize_f64(n)
                } else {
                    s.serialize_unit()
                }
            }
            Kind::String => s.serialize_str(v.as_str().unwrap_or_default()),
            Kind::Bytes => s.serialize_str(&String::from_utf8_lossy(v.as_bytes().unwrap_or_default())),
            Kind::Time => s.serialize_str(&format_time(v.num())),
            Kind::Duration => s.serialize_str(&format_duration(v.num())),
            Kind::Array => {
                let Some(arr) = v.as_array() else {
                    return s.serialize_unit();
                };
                let _visit = self.enter::<S::Error>()?;
                let items = read_lock(arr).clone();
                let mut seq = s.serialize_seq(Some(items.len()))?;
                for item in &items {
                    seq.serialize_element(&self.child(item))?;
                }
                seq.end()
            }
            Kind::Map => {
                let Some(map) = v.as_map() else {
                    return s.serialize_unit();
                };
                let _visit = self.enter::<S::Error>()?;
                let entries = read_lock(map).clone();
                let mut out = s.serialize_map(Some(entries.len()))?;
                for key in sorted_keys(&entries) {
                    if let Some(item) = entries.get(&key) {
                        out.serialize_entry(&*key, &self.child(item))?;
                    }
                }
                out.end()
            }
            Kind::Struct => match v.as_record() {
                Some(r) => r.to_json().serialize(s),
                None => s.serialize_unit(),
            },
            Kind::Func => s.serialize_str("<function>"),
            Kind::Proxy => s.serialize_str("<proxy>"),
            Kind::Return => {
                let inner = v.clone().unwrap_return();
                self.child(&inner).serialize(s)
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::string(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::string(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::nil())
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::nil())
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
        Deserialize::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut entries = fast_hash_map_with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<String, Value>()? {
            entries.insert(k.into(), v);
        }
        Ok(Value::map(entries))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Value, D::Error> {
        d.deserialize_any(ValueVisitor)
    }
}

impl Value {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }

    /// JSON text, or an error for cyclic or overly deep containers.
    pub fn encode_json(&self, pretty: bool) -> Result<String> {
        let text = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(text)
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::nil(),
            serde_json::Value::Bool(b) => Value::bool(*b),
            serde_json::Value::Number(n) => Value::number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s.as_str()),
            serde_json::Value::Array(items) => Value::array(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(obj) => {
                let mut entries = fast_hash_map_with_capacity(obj.len());
                for (k, v) in obj {
                    entries.insert(k.as_str().into(), Value::from_json(v));
                }
                Value::map(entries)
            }
        }
    }

    pub fn from_json_str(text: &str) -> Result<Value> {
        Ok(serde_json::from_str(text)?)
    }
}
