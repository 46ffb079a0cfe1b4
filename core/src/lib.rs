pub mod ast;
pub mod config;
pub mod engine;
pub mod eval;
pub mod module;
pub mod rt;
pub mod token;
pub mod util;
pub mod val;

// Stack bytecode compiler and VM
pub mod vm;

pub use config::EngineConfig;
pub use engine::{BuildError, Engine, Outcome, Program, build};
pub use val::Value;
