//! Bytecode subsystem: opcode table, compiler and the stack VM.

mod bytecode;
mod compiler;
mod context;
mod opcode;
mod spawn;
#[allow(clippy::module_inception)]
mod vm;

pub use bytecode::{Bytecode, Instruction};
pub use compiler::{Compiler, compile};
pub use context::Globals;
pub use opcode::{COMPARE_ABSENT, ENERGY, MAKE_ARRAY, MAKE_MAP, Opcode};
pub use spawn::{SpawnedTask, Spawner};
pub use vm::{DEFAULT_MAX_FRAMES, DEFAULT_STACK_CAPACITY, Vm};

#[cfg(test)]
mod vm_test;
