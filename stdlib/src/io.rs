use std::io::Write;
use std::sync::{Arc, Mutex};

use kit_core::module::Module;
use kit_core::util::{NameMap, fast_hash_map_new};
use kit_core::val::Value;
use tracing::info;

/// Captures every line passed to `log`, for hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, line: String) {
        self.lines.lock().unwrap_or_else(|p| p.into_inner()).push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Returns and clears the captured lines.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

/// Arguments rendered as text and joined by single spaces.
pub fn join_args(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, v) in args.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&v.text());
    }
    out
}

/// `log(...)`: emits an info event and feeds the optional sink. Returns nil.
pub fn log_fn(sink: Option<LogSink>) -> Value {
    Value::native(move |args| {
        let line = join_args(args);
        info!(target: "kit::script", "{}", line);
        if let Some(sink) = &sink {
            sink.push(line);
        }
        Value::nil()
    })
}

/// `print(...)`: writes one line to stdout and returns nil. Write errors
/// are ignored.
pub fn print_fn() -> Value {
    Value::native(|args| {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", join_args(args));
        Value::nil()
    })
}

/// `io` module: `log` and `print` under a namespace.
#[derive(Debug, Default)]
pub struct IoModule {
    sink: Option<LogSink>,
}

impl IoModule {
    pub fn new(sink: Option<LogSink>) -> Self {
        Self { sink }
    }
}

impl Module for IoModule {
    fn name(&self) -> &str {
        "io"
    }

    fn description(&self) -> &str {
        "Logging and console output"
    }

    fn exports(&self) -> NameMap<Value> {
        let mut exports = fast_hash_map_new();
        exports.insert(Arc::from("log"), log_fn(self.sink.clone()));
        exports.insert(Arc::from("print"), print_fn());
        exports
    }
}
