use std::sync::Arc;

use anyhow::{Result, anyhow, bail};

use crate::eval::compare_values;
use crate::val::{CompareOp, Kind, Value};
use crate::vm::bytecode::Bytecode;
use crate::vm::opcode::{COMPARE_ABSENT, ENERGY, MAKE_ARRAY, MAKE_MAP, Opcode};

use super::Vm;

fn name_operand(code: &Bytecode, pc: usize) -> Result<&Arc<str>> {
    let idx = code.read_u16(pc + 1)?;
    code.constant(idx)?
        .as_arc_str()
        .ok_or_else(|| anyhow!("operand {idx} at {pc} is not a name"))
}

/// Nil and the text "null" both count as absent for `??`.
fn is_absent(v: &Value) -> bool {
    v.is_nil() || v.as_str() == Some("null")
}

/// Hands back both operands, or the first Invalid among them.
fn first_invalid(a: Value, b: Value) -> Result<(Value, Value), Value> {
    if a.is_invalid() {
        Err(a)
    } else if b.is_invalid() {
        Err(b)
    } else {
        Ok((a, b))
    }
}

impl Vm {
    /// Executes until the frame entered at depth `stop` returns, or `HALT`.
    pub(super) fn dispatch(&mut self, stop: usize) -> Result<Value> {
        let code = Arc::clone(&self.bytecode);
        loop {
            let d = self.depth - 1;
            let pc = self.frames[d].ip;
            let op = code.opcode_at(pc)?;
            self.energy += ENERGY[op as usize] as u64;
            self.frames[d].ip = pc + 1 + op.operand_width();

            match op {
                Opcode::Halt => return self.halt(stop),
                Opcode::Push => {
                    let idx = code.read_u16(pc + 1)?;
                    let v = code.constant(idx)?;
                    // Closure descriptors capture the current frame's scope.
                    let v = match v.as_lambda() {
                        Some(l) if l.scope.is_none() => Value::lambda(l.capture(self.frames[d].scope.clone())),
                        _ => v.clone(),
                    };
                    self.stack.push(v);
                }
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::Load => {
                    let name = name_operand(&code, pc)?;
                    let v = self.lookup(d, name);
                    self.stack.push(v);
                }
                Opcode::Store => {
                    let name = name_operand(&code, pc)?;
                    let v = self.peek()?.clone();
                    self.store(d, name, v);
                }
                Opcode::Get => {
                    let key = self.pop()?;
                    let target = self.pop()?;
                    self.stack.push(target.get_by(&key));
                }
                Opcode::Dup => {
                    let v = self.peek()?.clone();
                    self.stack.push(v);
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let v = match op {
                        Opcode::Add => &a + &b,
                        Opcode::Sub => &a - &b,
                        Opcode::Mul => &a * &b,
                        Opcode::Div => &a / &b,
                        _ => &a % &b,
                    };
                    self.stack.push(v);
                }
                Opcode::Compare => {
                    let mode = code.read_u8(pc + 1)?;
                    if mode == COMPARE_ABSENT {
                        let a = self.pop()?;
                        self.stack.push(if a.is_invalid() { a } else { Value::bool(is_absent(&a)) });
                        continue;
                    }
                    let cmp = CompareOp::from_mode(mode).ok_or_else(|| anyhow!("unknown compare mode {mode} at {pc}"))?;
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(match first_invalid(a, b) {
                        Ok((a, b)) => compare_values(cmp, &a, &b),
                        Err(bad) => bad,
                    });
                }
                Opcode::And | Opcode::Or => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let v = match first_invalid(a, b) {
                        Ok((a, b)) => {
                            let pick_a = if op == Opcode::And { !a.truthy() } else { a.truthy() };
                            if pick_a { a } else { b }
                        }
                        Err(bad) => bad,
                    };
                    self.stack.push(v);
                }
                Opcode::Not => {
                    let a = self.pop()?;
                    self.stack.push(if a.is_invalid() { a } else { Value::bool(!a.truthy()) });
                }
                Opcode::Jump => {
                    let target = code.read_u16(pc + 1)?;
                    self.frames[d].ip = target as usize;
                }
                Opcode::True | Opcode::False => {
                    let target = code.read_u16(pc + 1)?;
                    let cond = self.pop()?;
                    // An Invalid condition ends the frame with that Invalid as its result.
                    if cond.is_invalid() {
                        self.stack.push(cond);
                        if let Some(v) = self.ret(stop)? {
                            return Ok(v);
                        }
                        continue;
                    }
                    if cond.truthy() == (op == Opcode::True) {
                        self.frames[d].ip = target as usize;
                    }
                }
                Opcode::Iter => {
                    let exit = code.read_u16(pc + 1)?;
                    self.step_iter(d, exit as usize)?;
                }
                Opcode::Make => {
                    let v = match code.read_u8(pc + 1)? {
                        MAKE_MAP => Value::empty_map(),
                        MAKE_ARRAY => Value::array(Vec::new()),
                        tag => bail!("unknown container tag {tag} at {pc}"),
                    };
                    self.stack.push(v);
                }
                Opcode::Set => {
                    let v = self.pop()?;
                    let key = self.pop()?;
                    let target = self.pop()?;
                    target.set(&key, v);
                    self.stack.push(target);
                }
                Opcode::Call => {
                    let argc = code.read_u8(pc + 1)?;
                    let args = self.pop_args(argc as usize)?;
                    let callee = self.pop()?;
                    self.call(callee, args)?;
                }
                Opcode::Invoke => {
                    let argc = code.read_u8(pc + 1)?;
                    let name = self.pop()?;
                    let args = self.pop_args(argc as usize)?;
                    let target = self.pop()?;
                    self.invoke(target, &name.text(), args)?;
                }
                Opcode::Return => {
                    if let Some(v) = self.ret(stop)? {
                        return Ok(v);
                    }
                }
                Opcode::Defer => {
                    let f = self.pop()?;
                    self.frames[d].defers.push(f);
                }
                Opcode::Spawn => {
                    let f = self.pop()?;
                    self.spawn(f);
                }
            }
        }
    }

    /// Pops the current frame, running its defers. Yields the result when
    /// the frame entered at `stop` is the one returning.
    fn ret(&mut self, stop: usize) -> Result<Option<Value>> {
        let d = self.depth - 1;
        let base = self.frames[d].base;
        let result = self.take_result(base);
        self.run_defers(d)?;
        self.stack.truncate(base);
        self.depth -= 1;
        if self.depth == stop {
            return Ok(Some(result));
        }
        self.stack.push(result);
        Ok(None)
    }

    fn halt(&mut self, stop: usize) -> Result<Value> {
        let d = self.depth - 1;
        let result = self.take_result(self.frames[d].base);
        for i in (stop..self.depth).rev() {
            self.run_defers(i)?;
        }
        let base = self.frames[stop].base;
        self.unwind_to(stop, base);
        self.halted = true;
        Ok(result)
    }

    fn take_result(&mut self, base: usize) -> Value {
        if self.stack.len() > base {
            self.stack.pop().unwrap_or_default()
        } else {
            Value::nil()
        }
    }

    /// Runs the deferred callables of frame `d`, last registered first.
    fn run_defers(&mut self, d: usize) -> Result<()> {
        let mut defers = std::mem::take(&mut self.frames[d].defers);
        while let Some(f) = defers.pop() {
            self.call_now(&f, &[])?;
        }
        defers.clear();
        self.frames[d].defers = defers;
        Ok(())
    }

    /// `[iterable, cursor]` sit on top of the stack. Pushes the next item and
    /// advances the cursor, or drops both and jumps to `exit`.
    fn step_iter(&mut self, d: usize, exit: usize) -> Result<()> {
        let len = self.stack.len();
        if len < self.frames[d].base + 2 {
            bail!("stack underflow in ITER");
        }
        let cursor = self.stack[len - 1].num() as usize;
        if cursor == 0 && self.stack[len - 2].kind() == Kind::Map {
            let keys = self.stack[len - 2].iter_items();
            self.stack[len - 2] = Value::array(keys);
        }
        match self.stack[len - 2].iter_at(cursor) {
            Some(item) => {
                self.stack[len - 1] = Value::number((cursor + 1) as f64);
                self.stack.push(item);
            }
            None => {
                self.stack.truncate(len - 2);
                self.frames[d].ip = exit;
            }
        }
        Ok(())
    }

    fn lookup(&self, d: usize, name: &str) -> Value {
        if let Some(v) = self.frames[d].scope.lookup(name) {
            return v;
        }
        if let Some(v) = self.module.get_local(name) {
            return v;
        }
        self.globals.get(name).cloned().unwrap_or_default()
    }

    /// Overwrites the nearest existing binding, else defines a local.
    fn store(&self, d: usize, name: &Arc<str>, v: Value) {
        let scope = &self.frames[d].scope;
        if scope.assign_existing(name, &v) || self.module.assign_existing(name, &v) {
            return;
        }
        scope.define(name.clone(), v);
    }

    #[inline]
    fn pop(&mut self) -> Result<Value> {
        let base = self.frames[self.depth - 1].base;
        if self.stack.len() <= base {
            bail!("stack underflow");
        }
        self.stack.pop().ok_or_else(|| anyhow!("stack underflow"))
    }

    #[inline]
    fn peek(&self) -> Result<&Value> {
        let base = self.frames[self.depth - 1].base;
        match self.stack.last() {
            Some(v) if self.stack.len() > base => Ok(v),
            _ => bail!("stack underflow"),
        }
    }

    fn pop_args(&mut self, argc: usize) -> Result<Vec<Value>> {
        let base = self.frames[self.depth - 1].base;
        if self.stack.len() < base + argc {
            bail!("stack underflow: call expects {argc} arguments");
        }
        Ok(self.stack.split_off(self.stack.len() - argc))
    }
}
