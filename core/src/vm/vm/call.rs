use anyhow::Result;
use tracing::{trace, warn};

use crate::eval::call_value;
use crate::val::{Callable, Lambda, Value};
use crate::vm::SpawnedTask;

use super::{Vm, unbound_reason};

/// Array methods that call back into script code.
const CALLBACK_METHODS: [&str; 4] = ["map", "filter", "find", "each"];

impl Vm {
    /// Pushes a frame for `lambda` with its parameters bound. Returns
    /// `false` when the closure has no body in the loaded bytecode.
    pub(super) fn enter_lambda(&mut self, lambda: &Lambda, args: &[Value]) -> Result<bool> {
        if !lambda.is_bound() || lambda.address >= self.bytecode.len() {
            return Ok(false);
        }
        self.push_frame(lambda.address, lambda.scope.clone())?;
        let scope = &self.frames[self.depth - 1].scope;
        for (i, param) in lambda.params.iter().enumerate() {
            scope.define(param.clone(), args.get(i).cloned().unwrap_or_default());
        }
        trace!(target: "kit::vm", address = lambda.address, depth = self.depth, "enter");
        Ok(true)
    }

    /// `CALL`: closures continue in the dispatch loop, everything else is
    /// called right away.
    pub(super) fn call(&mut self, callee: Value, args: Vec<Value>) -> Result<()> {
        if let Some(lambda) = callee.as_lambda() {
            if !self.enter_lambda(lambda, &args)? {
                self.stack.push(Value::invalid_because(unbound_reason(lambda)));
            }
            return Ok(());
        }
        let v = self.call_external(&callee, &args)?;
        self.stack.push(v);
        Ok(())
    }

    /// `INVOKE`: method dispatch on `target`. Nil and Invalid receivers
    /// yield themselves.
    pub(super) fn invoke(&mut self, target: Value, name: &str, args: Vec<Value>) -> Result<()> {
        if target.is_blank() {
            self.stack.push(target);
            return Ok(());
        }
        if let Some(p) = target.as_proxy() {
            self.stack.push(p.on_invoke(name, &args));
            return Ok(());
        }
        let attr = target.get(name);
        if attr.as_callable().is_some() {
            return self.call(attr, args);
        }
        self.stack.push(attr);
        Ok(())
    }

    /// Calls anything callable to completion, closures included.
    pub(super) fn call_now(&mut self, f: &Value, args: &[Value]) -> Result<Value> {
        match f.as_lambda() {
            Some(lambda) => self.try_execute_lambda(lambda, args),
            None => self.call_external(f, args),
        }
    }

    fn call_external(&mut self, f: &Value, args: &[Value]) -> Result<Value> {
        if let Some(c) = f.as_callable()
            && let Callable::Method { name, receiver, .. } = &**c
            && CALLBACK_METHODS.contains(name)
        {
            return self.callback_method(name, receiver, args);
        }
        Ok(call_value(f, args))
    }

    /// `map`, `filter`, `find` and `each` over a snapshot of the receiver.
    /// Callbacks get `(item, index)`; an Invalid callback result stops the walk.
    fn callback_method(&mut self, method: &str, receiver: &Value, args: &[Value]) -> Result<Value> {
        let f = args.first().cloned().unwrap_or_default();
        let items = receiver.iter_items();
        let mut out = Vec::new();
        for (i, item) in items.into_iter().enumerate() {
            let r = self.call_now(&f, &[item.clone(), Value::number(i as f64)])?;
            if r.is_invalid() {
                return Ok(r);
            }
            match method {
                "map" => out.push(r),
                "filter" if r.truthy() => out.push(item),
                "find" if r.truthy() => return Ok(item),
                _ => {}
            }
        }
        Ok(match method {
            "map" | "filter" => Value::array(out),
            "find" => Value::nil(),
            _ => receiver.clone(),
        })
    }

    pub(super) fn spawn(&mut self, f: Value) {
        let Some(lambda) = f.as_lambda() else {
            warn!(target: "kit::vm", kind = %f.kind(), "go expects a function");
            return;
        };
        let Some(spawner) = &self.spawner else {
            warn!(target: "kit::vm", address = lambda.address, "no spawner installed; dropping go request");
            return;
        };
        spawner.spawn(SpawnedTask {
            bytecode: self.bytecode.clone(),
            lambda: lambda.clone(),
            globals: self.globals.clone(),
            vars: self.module.snapshot(),
            max_frames: self.max_frames,
        });
    }
}
