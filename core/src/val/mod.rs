//! Runtime value model shared by the evaluator, compiler and VM.

mod convert;
mod func;
mod host;
mod json;
mod kind;
pub mod methods;
mod nav;
mod ops;
mod sql;
mod value;

pub use convert::{format_duration, format_number, format_time};
pub use func::*;
pub use host::*;
pub use kind::Kind;
pub use methods::{register_method, unregister_method};
pub use ops::CompareOp;
pub use sql::SqlValue;
pub use value::{ArrayRef, MapRef, Value};
