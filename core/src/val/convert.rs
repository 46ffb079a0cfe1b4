use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::util::{read_lock, sorted_keys};

use super::{Kind, Value};

const MAX_RENDER_DEPTH: usize = 32;

/// Appends the canonical text of a number: integral values without a
/// fractional part, everything else in shortest round-trip form.
pub fn push_number(buf: &mut String, n: f64) {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        let mut b = itoa::Buffer::new();
        buf.push_str(b.format(n as i64));
    } else {
        let mut b = ryu::Buffer::new();
        buf.push_str(b.format(n));
    }
}

pub fn format_number(n: f64) -> String {
    let mut s = String::with_capacity(24);
    push_number(&mut s, n);
    s
}

pub fn format_time(nanos: f64) -> String {
    let dt = DateTime::<Utc>::from_timestamp_nanos(nanos as i64);
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// `1h2m3.5s`, `250ms`, `0s` style rendering of a nanosecond count.
pub fn format_duration(nanos: f64) -> String {
    let mut out = String::new();
    let mut n = nanos;
    if n < 0.0 {
        out.push('-');
        n = -n;
    }
    if n == 0.0 {
        out.push_str("0s");
        return out;
    }
    const US: f64 = 1e3;
    const MS: f64 = 1e6;
    const S: f64 = 1e9;
    if n < US {
        push_number(&mut out, n);
        out.push_str("ns");
        return out;
    }
    if n < MS {
        push_number(&mut out, n / US);
        out.push_str("µs");
        return out;
    }
    if n < S {
        push_number(&mut out, n / MS);
        out.push_str("ms");
        return out;
    }
    let total_secs = n / S;
    let hours = (total_secs / 3600.0).floor();
    let minutes = ((total_secs - hours * 3600.0) / 60.0).floor();
    let secs = total_secs - hours * 3600.0 - minutes * 60.0;
    if hours > 0.0 {
        push_number(&mut out, hours);
        out.push('h');
    }
    if hours > 0.0 || minutes > 0.0 {
        push_number(&mut out, minutes);
        out.push('m');
    }
    push_number(&mut out, (secs * 1e9).round() / 1e9);
    out.push('s');
    out
}

impl Value {
    /// Human-readable rendering used for string concatenation and printing.
    pub fn text(&self) -> String {
        if let Some(s) = self.as_str() {
            return s.to_string();
        }
        let mut out = String::with_capacity(32);
        self.write_text(&mut out, &mut Vec::new());
        out
    }

    /// Appends the text form. `open` holds the containers being rendered
    /// above this value; one that recurs, or nests past `MAX_RENDER_DEPTH`,
    /// renders as `...`.
    pub(crate) fn write_text(&self, out: &mut String, open: &mut Vec<usize>) {
        if let Some(addr) = self.container_addr() {
            if open.len() >= MAX_RENDER_DEPTH || open.contains(&addr) {
                out.push_str("...");
                return;
            }
            open.push(addr);
            self.write_text_inner(out, open);
            open.pop();
        } else {
            self.write_text_inner(out, open);
        }
    }

    fn write_text_inner(&self, out: &mut String, open: &mut Vec<usize>) {
        match self.kind() {
            Kind::String => out.push_str(self.as_str().unwrap_or_default()),
            Kind::Number => push_number(out, self.num()),
            Kind::Bool => out.push_str(if self.num() > 0.0 { "true" } else { "false" }),
            Kind::Nil => out.push_str("null"),
            Kind::Invalid => out.push_str("invalid"),
            Kind::Time => out.push_str(&format_time(self.num())),
            Kind::Duration => out.push_str(&format_duration(self.num())),
            Kind::Bytes => out.push_str(&String::from_utf8_lossy(self.as_bytes().unwrap_or_default())),
            Kind::Array => {
                out.push('[');
                if let Some(arr) = self.as_array() {
                    let items = read_lock(arr).clone();
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        item.write_text(out, open);
                    }
                }
                out.push(']');
            }
            Kind::Map => {
                out.push('{');
                if let Some(map) = self.as_map() {
                    let entries = read_lock(map).clone();
                    for (i, key) in sorted_keys(&entries).iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(key);
                        out.push_str(": ");
                        if let Some(v) = entries.get(key) {
                            v.write_text(out, open);
                        }
                    }
                }
                out.push('}');
            }
            Kind::Func => out.push_str("<function>"),
            Kind::Proxy => out.push_str("<proxy>"),
            Kind::Struct => match self.as_record() {
                Some(r) => {
                    out.push('<');
                    out.push_str(r.type_name());
                    out.push('>');
                }
                None => out.push_str("<struct>"),
            },
            Kind::Any => out.push_str("<any>"),
            Kind::Return => self.clone().unwrap_return().write_text(out, open),
        }
    }

    /// Numeric conversion used by the `int`/`float` methods: strings are
    /// parsed, booleans map to 0/1, everything non-numeric becomes `Invalid`.
    pub fn to_number(&self) -> Value {
        match self.kind() {
            Kind::Number | Kind::Bool | Kind::Time | Kind::Duration => Value::number(self.num()),
            Kind::Nil => Value::number(0.0),
            Kind::String => self
                .as_str()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .map(Value::number)
                .unwrap_or_else(Value::invalid),
            _ => Value::invalid(),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::string(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::nil()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        let nanos = t.timestamp_nanos_opt().unwrap_or(i64::MAX);
        Value::time_nanos(nanos as f64)
    }
}

impl From<std::time::Duration> for Value {
    fn from(d: std::time::Duration) -> Self {
        Value::duration_nanos(d.as_nanos() as f64)
    }
}
