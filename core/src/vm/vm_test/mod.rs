pub(super) use std::sync::{Arc, Mutex};

pub(super) use crate::{
    ast::parse,
    eval::{Environment, Evaluator},
    val::{Lambda, Value},
    vm::{Bytecode, Globals, Opcode, SpawnedTask, Vm, compile},
};

pub(super) fn build(src: &str) -> Arc<Bytecode> {
    let program = parse(src).unwrap_or_else(|e| panic!("parse failed: {e:?}"));
    Arc::new(compile(&program).unwrap())
}

pub(super) fn vm_with(src: &str, globals: Globals) -> Vm {
    Vm::new(build(src), globals.into_shared())
}

pub(super) fn run(src: &str) -> Value {
    vm_with(src, Globals::new()).run()
}

pub(super) fn run_with(src: &str, globals: Globals) -> Value {
    vm_with(src, globals).run()
}

pub(super) fn eval(src: &str) -> Value {
    let program = parse(src).unwrap();
    Evaluator::new().eval_program(&program, &Environment::new())
}

/// Globals with a `log(x)` that records the text of its first argument.
pub(super) fn logging_globals() -> (Globals, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let mut globals = Globals::new();
    globals.insert(
        "log",
        Value::native(move |args| {
            let text = args.first().map(Value::text).unwrap_or_default();
            sink.lock().unwrap().push(text);
            Value::nil()
        }),
    );
    (globals, lines)
}

pub(super) fn numbers(xs: &[f64]) -> Value {
    Value::array(xs.iter().map(|&x| Value::number(x)).collect())
}

mod bytecode;
mod concurrency;
mod control_flow;
mod functions;
mod semantics;
