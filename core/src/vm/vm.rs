mod call;
mod exec;
mod frame;

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::val::{Lambda, Scope, ScopeCell, Value};

use super::{Bytecode, Globals, Spawner};
use frame::Frame;

pub const DEFAULT_MAX_FRAMES: usize = 64;
pub const DEFAULT_STACK_CAPACITY: usize = 256;

/// Stack machine executing one [`Bytecode`] against shared [`Globals`].
///
/// A VM is single-threaded. Concurrency comes from running several VMs over
/// the same `Arc<Bytecode>`. Frames, the operand stack and the module scope
/// are kept across runs and cleared rather than reallocated.
pub struct Vm {
    bytecode: Arc<Bytecode>,
    globals: Arc<Globals>,
    /// Module-level variables; the top-level frame runs directly in it.
    module: Scope,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    /// Active frames; `frames[..depth]` are live.
    depth: usize,
    max_frames: usize,
    energy: u64,
    halted: bool,
    spawner: Option<Arc<dyn Spawner>>,
}

impl Vm {
    pub fn new(bytecode: Arc<Bytecode>, globals: Arc<Globals>) -> Self {
        Self {
            bytecode,
            globals,
            module: ScopeCell::new(None),
            stack: Vec::with_capacity(DEFAULT_STACK_CAPACITY),
            frames: Vec::new(),
            depth: 0,
            max_frames: DEFAULT_MAX_FRAMES,
            energy: 0,
            halted: false,
            spawner: None,
        }
    }

    pub fn with_stack_capacity(mut self, capacity: usize) -> Self {
        self.stack.reserve(capacity.saturating_sub(self.stack.capacity()));
        self
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn set_spawner(&mut self, spawner: Option<Arc<dyn Spawner>>) {
        self.spawner = spawner;
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Call depth limit. Exceeding it faults the run.
    pub fn set_max_frames(&mut self, max_frames: usize) {
        self.max_frames = max_frames.max(1);
    }

    pub fn bytecode(&self) -> &Arc<Bytecode> {
        &self.bytecode
    }

    pub fn globals(&self) -> &Arc<Globals> {
        &self.globals
    }

    /// Installs new bytecode. Module variables survive.
    pub fn load(&mut self, bytecode: Arc<Bytecode>) {
        self.bytecode = bytecode;
        self.fast_reset();
    }

    pub fn set_var(&mut self, name: impl Into<Arc<str>>, value: Value) {
        self.module.define(name.into(), value);
    }

    pub fn var(&self, name: &str) -> Option<Value> {
        self.module.get_local(name)
    }

    /// Energy consumed since the last [`Vm::run`].
    pub fn energy(&self) -> u64 {
        self.energy
    }

    /// Whether the last run stopped on `HALT`.
    pub fn halted(&self) -> bool {
        self.halted
    }

    /// Clears the operand stack, frames and pending defers. Allocations and
    /// module variables are kept.
    pub fn fast_reset(&mut self) {
        self.stack.clear();
        for frame in &mut self.frames[..self.depth] {
            frame.defers.clear();
        }
        self.depth = 0;
        self.halted = false;
    }

    /// Runs the program from address 0. Faults come back as an `Invalid`
    /// value carrying the reason.
    pub fn run(&mut self) -> Value {
        match self.try_run() {
            Ok(v) => v,
            Err(e) => {
                debug!(target: "kit::vm", error = %e, energy = self.energy, "run faulted");
                Value::invalid_because(e.to_string())
            }
        }
    }

    pub fn try_run(&mut self) -> Result<Value> {
        self.fast_reset();
        self.energy = 0;
        let module = self.module.clone();
        self.push_frame_with(0, module)?;
        let result = self.dispatch(0);
        if result.is_err() {
            self.fast_reset();
        }
        result
    }

    /// Calls a closure. Safe to use while a run is in progress, e.g. from a
    /// callback method; control returns once the closure's frame returns.
    pub fn execute_lambda(&mut self, lambda: &Lambda, args: &[Value]) -> Value {
        match self.try_execute_lambda(lambda, args) {
            Ok(v) => v,
            Err(e) => {
                debug!(target: "kit::vm", error = %e, address = lambda.address, "lambda faulted");
                Value::invalid_because(e.to_string())
            }
        }
    }

    pub fn try_execute_lambda(&mut self, lambda: &Lambda, args: &[Value]) -> Result<Value> {
        let stop = self.depth;
        let base = self.stack.len();
        if !self.enter_lambda(lambda, args)? {
            return Ok(Value::invalid_because(unbound_reason(lambda)));
        }
        let result = self.dispatch(stop);
        if result.is_err() {
            self.unwind_to(stop, base);
        }
        result
    }

    fn push_frame(&mut self, ip: usize, parent: Option<Scope>) -> Result<()> {
        self.check_depth()?;
        let base = self.stack.len();
        match self.frames.get_mut(self.depth) {
            Some(frame) => frame.reenter(ip, base, parent),
            None => self.frames.push(Frame::new(ip, base, parent)),
        }
        self.depth += 1;
        Ok(())
    }

    fn push_frame_with(&mut self, ip: usize, scope: Scope) -> Result<()> {
        self.check_depth()?;
        let base = self.stack.len();
        match self.frames.get_mut(self.depth) {
            Some(frame) => frame.reenter_with(ip, base, scope),
            None => {
                let mut frame = Frame::new(ip, base, None);
                frame.scope = scope;
                self.frames.push(frame);
            }
        }
        self.depth += 1;
        Ok(())
    }

    fn check_depth(&self) -> Result<()> {
        if self.depth >= self.max_frames {
            anyhow::bail!("call depth exceeded ({} frames)", self.max_frames);
        }
        Ok(())
    }

    /// Drops frames above `depth` and the stack above `base` after a fault.
    fn unwind_to(&mut self, depth: usize, base: usize) {
        for frame in &mut self.frames[depth..self.depth] {
            frame.defers.clear();
        }
        self.depth = depth;
        self.stack.truncate(base);
    }
}

fn unbound_reason(lambda: &Lambda) -> String {
    if lambda.is_bound() {
        format!("function entry {} is outside the program", lambda.address)
    } else {
        "function has no compiled body".to_string()
    }
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("depth", &self.depth)
            .field("stack", &self.stack.len())
            .field("energy", &self.energy)
            .field("halted", &self.halted)
            .finish()
    }
}
