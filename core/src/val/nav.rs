use std::sync::Arc;

use crate::util::{read_lock, sorted_keys, write_lock};

use super::{Callable, Kind, Value, methods};

impl Value {
    /// Element count for strings (bytes), byte buffers, arrays and maps.
    pub fn len(&self) -> usize {
        match self.kind() {
            Kind::String => self.as_str().map_or(0, str::len),
            Kind::Bytes => self.as_bytes().map_or(0, <[u8]>::len),
            Kind::Array => self.as_array().map_or(0, |a| read_lock(a).len()),
            Kind::Map => self.as_map().map_or(0, |m| read_lock(m).len()),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Positional access. Out of range and non-indexable values give nil.
    pub fn index(&self, i: i64) -> Value {
        if i < 0 {
            return Value::nil();
        }
        let i = i as usize;
        match self.kind() {
            Kind::Array => self
                .as_array()
                .and_then(|a| read_lock(a).get(i).cloned())
                .unwrap_or_default(),
            Kind::Bytes => self
                .as_bytes()
                .and_then(|b| b.get(i).copied())
                .map(|b| Value::number(b as f64))
                .unwrap_or_default(),
            Kind::String => self
                .as_str()
                .and_then(|s| s.as_bytes().get(i..i + 1))
                .map(|b| Value::string(String::from_utf8_lossy(b).into_owned()))
                .unwrap_or_default(),
            _ => Value::nil(),
        }
    }

    /// Property access with the lookup order scripts rely on:
    /// proxy delegation, the `length`/`type` pseudo-properties, built-in and
    /// registered methods, then the kind's own data. Misses yield nil.
    pub fn get(&self, key: &str) -> Value {
        if let Some(p) = self.as_proxy() {
            return p.on_get(key);
        }
        match key {
            "length" => return Value::number(self.len() as f64),
            "type" => return Value::string(self.kind().name()),
            _ => {}
        }
        if let Some(m) = methods::lookup(self.kind(), key) {
            return Value::callable(Callable::Method {
                name: m.name,
                method: m.func,
                receiver: self.clone(),
            });
        }
        if !self.is_object() {
            return Value::nil();
        }
        match self.kind() {
            Kind::Map => self
                .as_map()
                .and_then(|m| read_lock(m).get(key).cloned())
                .unwrap_or_default(),
            Kind::Struct => match self.as_record() {
                Some(r) if r.has_method(key) => Value::callable(Callable::RecordMethod {
                    record: r.clone(),
                    name: Arc::from(key),
                }),
                Some(r) => r.get_field(key).unwrap_or_default(),
                None => Value::nil(),
            },
            _ => Value::nil(),
        }
    }

    /// Subscript access: numbers index positionally, anything else goes
    /// through [`Value::get`] by its text.
    pub fn get_by(&self, key: &Value) -> Value {
        if key.is_number() && self.kind() != Kind::Map && self.as_proxy().is_none() {
            return self.index(key.as_i64());
        }
        match key.as_str() {
            Some(k) => self.get(k),
            None => self.get(&key.text()),
        }
    }

    /// Container mutation behind `SET`: maps insert under the key's text,
    /// arrays overwrite an in-range numeric index and append otherwise.
    /// Returns `false` for values that cannot be written to.
    pub fn set(&self, key: &Value, val: Value) -> bool {
        match self.kind() {
            Kind::Map => match self.as_map() {
                Some(m) => {
                    let k: Arc<str> = match key.as_arc_str() {
                        Some(s) => s.clone(),
                        None => Arc::from(key.text()),
                    };
                    write_lock(m).insert(k, val);
                    true
                }
                None => false,
            },
            Kind::Array => match self.as_array() {
                Some(a) => {
                    let mut items = write_lock(a);
                    let slot = if key.is_number() && key.num() >= 0.0 {
                        Some(key.num() as usize)
                    } else {
                        None
                    };
                    match slot {
                        Some(i) if i < items.len() => items[i] = val,
                        _ => items.push(val),
                    }
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Method call without a VM. Script lambdas found on the receiver cannot
    /// be executed here and yield `Invalid`; the VM intercepts them first.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Value {
        if self.is_invalid() {
            return self.clone();
        }
        if let Some(p) = self.as_proxy() {
            return p.on_invoke(name, args);
        }
        let attr = self.get(name);
        match attr.as_callable() {
            Some(c) => c.call_native(args),
            None => attr,
        }
    }

    /// Snapshot of the items a `for ... in` loop walks: array elements,
    /// sorted map keys or one-byte strings.
    pub fn iter_items(&self) -> Vec<Value> {
        match self.kind() {
            Kind::Array => self.as_array().map(|a| read_lock(a).clone()).unwrap_or_default(),
            Kind::Map => self
                .as_map()
                .map(|m| sorted_keys(&read_lock(m)).into_iter().map(Value::string).collect())
                .unwrap_or_default(),
            Kind::String | Kind::Bytes => (0..self.len() as i64).map(|i| self.index(i)).collect(),
            _ => Vec::new(),
        }
    }

    /// Single-item access used by the `ITER` opcode. Maps are snapshotted
    /// into their key array before the first step.
    pub fn iter_at(&self, cursor: usize) -> Option<Value> {
        match self.kind() {
            Kind::Array => self.as_array().and_then(|a| read_lock(a).get(cursor).cloned()),
            Kind::String | Kind::Bytes => (cursor < self.len()).then(|| self.index(cursor as i64)),
            _ => None,
        }
    }
}
