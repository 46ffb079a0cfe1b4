mod runtime;

pub use runtime::{TaskRuntime, shared_runtime};

#[cfg(test)]
mod concurrency_test;
