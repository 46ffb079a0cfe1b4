//! Host embedding surface: build once, execute many times.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::ast::{self, parse};
use crate::config::EngineConfig;
use crate::eval::{Environment, Evaluator};
use crate::rt::TaskRuntime;
use crate::token::ParseError;
use crate::val::{Lambda, Value};
use crate::vm::{Bytecode, Globals, Spawner, Vm, compile};

/// Why a source failed to build.
#[derive(Debug)]
pub enum BuildError {
    /// Every lex and parse error found; compilation was not attempted.
    Parse(Vec<ParseError>),
    Compile(anyhow::Error),
}

impl BuildError {
    /// One human-readable line per problem.
    pub fn messages(&self) -> Vec<String> {
        match self {
            BuildError::Parse(errors) => errors.iter().map(ToString::to_string).collect(),
            BuildError::Compile(e) => vec![format!("{:#}", e)],
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join("\n"))
    }
}

impl std::error::Error for BuildError {}

/// A compiled script. Cloning shares the bytecode.
#[derive(Debug, Clone)]
pub struct Program {
    ast: Arc<ast::Program>,
    bytecode: Arc<Bytecode>,
}

impl Program {
    pub fn bytecode(&self) -> &Arc<Bytecode> {
        &self.bytecode
    }

    pub fn ast(&self) -> &ast::Program {
        &self.ast
    }

    pub fn disassemble(&self) -> String {
        self.bytecode.disassemble()
    }
}

/// Lexes, parses and compiles `source`, refusing to compile on any parse error.
pub fn build(source: &str) -> Result<Program, BuildError> {
    let tree = parse(source).map_err(BuildError::Parse)?;
    let bytecode = compile(&tree).map_err(BuildError::Compile)?;
    Ok(Program {
        ast: Arc::new(tree),
        bytecode: Arc::new(bytecode),
    })
}

/// Result of one guarded execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub value: Value,
    pub energy: u64,
    /// Set for faults, host panics, timeouts and Invalid results.
    pub error: Option<String>,
}

impl Outcome {
    fn finished(value: Value, energy: u64) -> Self {
        let error = value.invalid_reason().map(str::to_string);
        Self { value, energy, error }
    }

    fn failed(reason: String, energy: u64) -> Self {
        Self {
            value: Value::invalid_because(reason.clone()),
            energy,
            error: Some(reason),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Shared configuration and bindings for running programs.
///
/// Every execution gets a fresh [`Vm`]; an `Engine` can be shared across
/// threads and used concurrently.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    globals: Arc<Globals>,
    spawner: Option<Arc<dyn Spawner>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            globals: Globals::new().into_shared(),
            spawner: None,
        }
    }

    pub fn with_globals(mut self, globals: Globals) -> Self {
        self.globals = globals.into_shared();
        self
    }

    /// Receives `go` requests. Without one they are dropped.
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn globals(&self) -> &Arc<Globals> {
        &self.globals
    }

    /// Builds `source` and runs the discovery pass over it.
    ///
    /// Discovery evaluates the top level once against the globals, so the
    /// script can call host registration functions. Functions it creates
    /// are bound to their compiled entries and can be handed to
    /// [`Engine::execute_lambda`] later.
    pub fn build(&self, source: &str) -> Result<(Program, Value), BuildError> {
        let program = build(source)?;
        let discovered = Evaluator::new()
            .with_globals(&self.globals)
            .with_entries(&program.bytecode.entries)
            .eval_program(&program.ast, &Environment::new());
        debug!(
            target: "kit::engine",
            bytes = program.bytecode.len(),
            constants = program.bytecode.constants.len(),
            invalid = discovered.is_invalid(),
            "program built"
        );
        Ok((program, discovered))
    }

    pub fn vm(&self, program: &Program) -> Vm {
        let mut vm = Vm::new(program.bytecode.clone(), self.globals.clone())
            .with_stack_capacity(self.config.stack_capacity);
        vm.set_max_frames(self.config.max_frames);
        vm.set_spawner(self.spawner.clone());
        vm
    }

    pub fn execute(&self, program: &Program) -> Outcome {
        guarded(self.vm(program), |vm| vm.try_run())
    }

    pub fn execute_lambda(&self, program: &Program, lambda: &Lambda, args: &[Value]) -> Outcome {
        guarded(self.vm(program), |vm| vm.try_execute_lambda(lambda, args))
    }

    /// Runs on `runtime`'s blocking pool, racing the configured timeout.
    ///
    /// A timed-out script is abandoned, not stopped: it keeps its thread
    /// until it finishes by itself. Without a configured timeout this is
    /// [`Engine::execute`].
    pub fn execute_with_timeout(&self, program: &Program, runtime: &TaskRuntime) -> Outcome {
        let Some(timeout) = self.config.timeout() else {
            return self.execute(program);
        };
        let vm = self.vm(program);
        match runtime.run_with_timeout(move || guarded(vm, |vm| vm.try_run()), timeout) {
            Ok(outcome) => outcome,
            Err(e) => Outcome::failed(e.to_string(), 0),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("globals", &self.globals.len())
            .field("spawner", &self.spawner.is_some())
            .finish()
    }
}

/// Runs `body`, turning faults and host panics into a failed [`Outcome`].
fn guarded<F>(mut vm: Vm, body: F) -> Outcome
where
    F: FnOnce(&mut Vm) -> anyhow::Result<Value>,
{
    let result = catch_unwind(AssertUnwindSafe(|| body(&mut vm)));
    let energy = vm.energy();
    match result {
        Ok(Ok(value)) => Outcome::finished(value, energy),
        Ok(Err(e)) => Outcome::failed(format!("{:#}", e), energy),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(target: "kit::engine", %message, "host panic during execution");
            vm.fast_reset();
            Outcome::failed(format!("panic: {}", message), energy)
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod engine_test;
