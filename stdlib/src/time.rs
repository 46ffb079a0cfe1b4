use std::sync::Arc;

use chrono::Utc;
use kit_core::module::Module;
use kit_core::util::{NameMap, fast_hash_map_new};
use kit_core::val::{Kind, Value};

const NANOS_PER_MS: f64 = 1e6;
const NANOS_PER_SECOND: f64 = 1e9;

/// Current wall-clock time as a Time value.
pub fn now() -> Value {
    Value::from(Utc::now())
}

fn scaled(func: &'static str, nanos_per_unit: f64) -> Value {
    Value::native(move |args| match args.first() {
        Some(v) if v.is_number() => Value::duration_nanos(v.num() * nanos_per_unit),
        Some(v) => Value::invalid_because(format!("time.{} expects a number, got {}", func, v.kind().name())),
        None => Value::invalid_because(format!("time.{} expects a number", func)),
    })
}

#[derive(Debug, Default)]
pub struct TimeModule;

impl TimeModule {
    pub fn new() -> Self {
        Self
    }

    /// `time.since(t)`: Duration elapsed since a Time.
    fn since(args: &[Value]) -> Value {
        match args.first() {
            Some(t) if t.kind() == Kind::Time => Value::duration_nanos(now().num() - t.num()),
            Some(v) => Value::invalid_because(format!("time.since expects a time, got {}", v.kind().name())),
            None => Value::invalid_because("time.since expects a time"),
        }
    }
}

impl Module for TimeModule {
    fn name(&self) -> &str {
        "time"
    }

    fn description(&self) -> &str {
        "Clock and duration helpers"
    }

    fn exports(&self) -> NameMap<Value> {
        let mut exports = fast_hash_map_new();
        exports.insert(Arc::from("now"), Value::native(|_| now()));
        exports.insert(Arc::from("ms"), scaled("ms", NANOS_PER_MS));
        exports.insert(Arc::from("seconds"), scaled("seconds", NANOS_PER_SECOND));
        exports.insert(Arc::from("since"), Value::native(Self::since));
        exports
    }
}
