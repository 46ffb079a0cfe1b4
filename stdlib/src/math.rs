use std::sync::Arc;

use kit_core::module::Module;
use kit_core::util::{NameMap, fast_hash_map_new};
use kit_core::val::Value;

#[derive(Debug, Default)]
pub struct MathModule;

fn number_arg(func: &str, args: &[Value], i: usize) -> Result<f64, Value> {
    match args.get(i) {
        Some(v) if v.is_number() => Ok(v.num()),
        Some(v) => Err(Value::invalid_because(format!(
            "math.{} expects a number, got {}",
            func,
            v.kind().name()
        ))),
        None => Err(Value::invalid_because(format!("math.{} is missing argument {}", func, i + 1))),
    }
}

fn unary(func: &'static str, op: fn(f64) -> f64) -> Value {
    Value::native(move |args| match number_arg(func, args, 0) {
        Ok(n) => Value::number(op(n)),
        Err(invalid) => invalid,
    })
}

fn fold(func: &'static str, pick: fn(f64, f64) -> f64) -> Value {
    Value::native(move |args| {
        if args.is_empty() {
            return Value::invalid_because(format!("math.{} expects at least one number", func));
        }
        let mut acc = match number_arg(func, args, 0) {
            Ok(n) => n,
            Err(invalid) => return invalid,
        };
        for i in 1..args.len() {
            match number_arg(func, args, i) {
                Ok(n) => acc = pick(acc, n),
                Err(invalid) => return invalid,
            }
        }
        Value::number(acc)
    })
}

impl MathModule {
    pub fn new() -> Self {
        Self
    }

    fn pow(args: &[Value]) -> Value {
        match (number_arg("pow", args, 0), number_arg("pow", args, 1)) {
            (Ok(base), Ok(exp)) => Value::number(base.powf(exp)),
            (Err(invalid), _) | (_, Err(invalid)) => invalid,
        }
    }

    /// Negative input has no real root and yields nil, like division by zero.
    fn sqrt(args: &[Value]) -> Value {
        match number_arg("sqrt", args, 0) {
            Ok(n) if n < 0.0 => Value::nil(),
            Ok(n) => Value::number(n.sqrt()),
            Err(invalid) => invalid,
        }
    }
}

impl Module for MathModule {
    fn name(&self) -> &str {
        "math"
    }

    fn description(&self) -> &str {
        "Numeric helpers"
    }

    fn exports(&self) -> NameMap<Value> {
        let mut exports = fast_hash_map_new();
        exports.insert(Arc::from("abs"), unary("abs", f64::abs));
        exports.insert(Arc::from("floor"), unary("floor", f64::floor));
        exports.insert(Arc::from("ceil"), unary("ceil", f64::ceil));
        exports.insert(Arc::from("round"), unary("round", f64::round));
        exports.insert(Arc::from("min"), fold("min", f64::min));
        exports.insert(Arc::from("max"), fold("max", f64::max));
        exports.insert(Arc::from("pow"), Value::native(Self::pow));
        exports.insert(Arc::from("sqrt"), Value::native(Self::sqrt));
        exports.insert(Arc::from("pi"), Value::number(std::f64::consts::PI));
        exports.insert(Arc::from("e"), Value::number(std::f64::consts::E));
        exports
    }
}
