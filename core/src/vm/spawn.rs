use std::sync::Arc;

use crate::util::NameMap;
use crate::val::{Lambda, Value};

use super::{Bytecode, Globals, Vm};

/// A `go` request: everything needed to run the closure on a fresh VM.
///
/// The closure keeps its captured scope, so a spawned task and its parent
/// frame share those variables with no ordering between their writes. Hosts
/// that need a deterministic result must serialize the two themselves.
pub struct SpawnedTask {
    pub bytecode: Arc<Bytecode>,
    pub lambda: Lambda,
    pub globals: Arc<Globals>,
    /// Module variables of the spawning VM at the time of the request.
    pub vars: NameMap<Value>,
    pub max_frames: usize,
}

impl SpawnedTask {
    /// Runs the closure to completion on the current thread.
    pub fn run(self) -> Value {
        let mut vm = Vm::new(self.bytecode, self.globals);
        vm.set_max_frames(self.max_frames);
        for (name, value) in self.vars {
            vm.set_var(name, value);
        }
        vm.execute_lambda(&self.lambda, &[])
    }
}

impl std::fmt::Debug for SpawnedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedTask")
            .field("lambda", &self.lambda)
            .field("vars", &self.vars.len())
            .finish()
    }
}

/// Host hook receiving `go` requests. The VM never waits on the task.
pub trait Spawner: Send + Sync {
    fn spawn(&self, task: SpawnedTask);
}

impl<F> Spawner for F
where
    F: Fn(SpawnedTask) + Send + Sync,
{
    fn spawn(&self, task: SpawnedTask) {
        self(task)
    }
}
