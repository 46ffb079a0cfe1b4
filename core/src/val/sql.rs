//! Bridge between script values and a row-oriented data layer.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use super::{Kind, Value};

/// Column value as exchanged with a database driver.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Converts a value for a statement parameter. Arrays and maps are stored
    /// as JSON text.
    pub fn to_sql(&self) -> Result<SqlValue> {
        Ok(match self.kind() {
            Kind::Invalid | Kind::Nil => SqlValue::Null,
            Kind::Bool => SqlValue::Bool(self.num() > 0.0),
            Kind::Number => SqlValue::Real(self.num()),
            Kind::String => SqlValue::Text(self.as_str().unwrap_or_default().to_string()),
            Kind::Time => SqlValue::Timestamp(DateTime::<Utc>::from_timestamp_nanos(self.num() as i64)),
            Kind::Duration => SqlValue::Integer(self.num() as i64),
            Kind::Bytes => SqlValue::Blob(self.as_bytes().unwrap_or_default().to_vec()),
            Kind::Array | Kind::Map => SqlValue::Text(self.encode_json(false)?),
            other => bail!("unsupported type for SQL: {}", other),
        })
    }

    /// Reads a column back. Text (or UTF-8 blobs) shaped like a JSON object
    /// or array is decoded into a container; anything else stays as text.
    pub fn scan(src: SqlValue) -> Value {
        match src {
            SqlValue::Null => Value::nil(),
            SqlValue::Bool(b) => Value::bool(b),
            SqlValue::Integer(i) => Value::number(i as f64),
            SqlValue::Real(f) => Value::number(f),
            SqlValue::Timestamp(t) => Value::from(t),
            SqlValue::Text(s) => scan_text(s),
            SqlValue::Blob(bytes) => match String::from_utf8(bytes) {
                Ok(s) => scan_text(s),
                Err(e) => Value::bytes(e.into_bytes()),
            },
        }
    }
}

fn scan_text(s: String) -> Value {
    let trimmed = s.trim();
    let looks_like_json = trimmed.len() > 1
        && ((trimmed.starts_with('{') && trimmed.ends_with('}'))
            || (trimmed.starts_with('[') && trimmed.ends_with(']')));
    if looks_like_json && let Ok(v) = Value::from_json_str(trimmed) {
        return v;
    }
    Value::string(s)
}
