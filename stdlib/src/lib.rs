pub mod io;
pub mod json;
pub mod math;
pub mod time;


use std::sync::Arc;

use anyhow::Result;
use kit_core::module::ModuleRegistry;
use kit_core::val::Value;
use kit_core::vm::Globals;

pub use io::LogSink;

/// Registers the `io`, `json`, `math` and `time` modules.
pub fn register_stdlib_modules(registry: &mut ModuleRegistry, sink: Option<LogSink>) -> Result<()> {
    registry.register_module(Arc::new(io::IoModule::new(sink)))?;
    registry.register_module(Arc::new(json::JsonModule::new()))?;
    registry.register_module(Arc::new(math::MathModule::new()))?;
    registry.register_module(Arc::new(time::TimeModule::new()))?;
    Ok(())
}

/// Registers the loose builtins available without a module prefix:
/// - `log(...)`: info-level tracing event, also captured by `sink`
/// - `print(...)`: one line on stdout
/// - `now()`: current time
pub fn register_stdlib_globals(registry: &mut ModuleRegistry, sink: Option<LogSink>) {
    registry.register_builtin("log", io::log_fn(sink));
    registry.register_builtin("print", io::print_fn());
    registry.register_builtin("now", Value::native(|_| time::now()));
}

/// Modules plus loose builtins, ready for an `Engine`.
pub fn stdlib_globals(sink: Option<LogSink>) -> Result<Globals> {
    let mut registry = ModuleRegistry::new();
    register_stdlib_modules(&mut registry, sink.clone())?;
    register_stdlib_globals(&mut registry, sink);
    registry.globals()
}
