//! Tokio-backed task runtime.
//!
//! Runs `go` requests on the blocking pool and races VM executions against a
//! wall-clock timeout. A VM cannot be interrupted, so a timed-out execution
//! keeps running detached until it finishes on its own.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tracing::{debug, warn};

use crate::vm::{SpawnedTask, Spawner};

pub struct TaskRuntime {
    // Taken in `drop` so shutdown never waits on detached work.
    inner: Option<Runtime>,
    spawned: AtomicU64,
}

impl TaskRuntime {
    pub fn new_multi_thread() -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .thread_name("kit-rt")
            .enable_all()
            .build()
            .map_err(|e| anyhow!("failed to create tokio runtime: {}", e))?;
        Ok(Self::from_runtime(runtime))
    }

    /// Single-threaded scheduler; blocking work still gets its own threads.
    pub fn new_current_thread() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| anyhow!("failed to create tokio runtime: {}", e))?;
        Ok(Self::from_runtime(runtime))
    }

    fn from_runtime(runtime: Runtime) -> Self {
        Self {
            inner: Some(runtime),
            spawned: AtomicU64::new(0),
        }
    }

    fn runtime(&self) -> &Runtime {
        // `inner` is only emptied by `drop`.
        match &self.inner {
            Some(rt) => rt,
            None => unreachable!("task runtime used after shutdown"),
        }
    }

    pub fn handle(&self) -> Handle {
        self.runtime().handle().clone()
    }

    pub fn is_multi_threaded(&self) -> bool {
        matches!(self.runtime().handle().runtime_flavor(), RuntimeFlavor::MultiThread)
    }

    /// Number of `go` requests accepted so far.
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Must not be called from inside an async context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime().block_on(future)
    }

    /// Runs `work` on the blocking pool, giving up after `timeout`.
    ///
    /// On timeout the work is detached, not cancelled.
    pub fn run_with_timeout<T, F>(&self, work: F, timeout: Duration) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let job = self.runtime().spawn_blocking(work);
        self.block_on(async move {
            match tokio::time::timeout(timeout, job).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(anyhow!("execution failed: {}", e)),
                Err(_) => {
                    warn!(target: "kit::rt", timeout_ms = timeout.as_millis() as u64, "execution timed out");
                    Err(anyhow!("execution timed out after {} ms", timeout.as_millis()))
                }
            }
        })
    }
}

impl Spawner for TaskRuntime {
    fn spawn(&self, task: SpawnedTask) {
        let id = self.spawned.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(target: "kit::rt", task = id, "spawning task");
        self.runtime().spawn_blocking(move || {
            let result = task.run();
            if let Some(reason) = result.invalid_reason() {
                warn!(target: "kit::rt", task = id, reason, "spawned task failed");
            }
        });
    }
}

impl std::fmt::Debug for TaskRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRuntime")
            .field("spawned", &self.spawned())
            .finish()
    }
}

impl Drop for TaskRuntime {
    fn drop(&mut self) {
        if let Some(rt) = self.inner.take() {
            rt.shutdown_background();
        }
    }
}

static SHARED_RUNTIME: Lazy<Mutex<Option<Arc<TaskRuntime>>>> = Lazy::new(|| Mutex::new(None));

fn create_runtime() -> Result<TaskRuntime> {
    if std::env::var_os("KIT_SINGLE_THREAD").is_some() {
        return TaskRuntime::new_current_thread();
    }
    TaskRuntime::new_multi_thread().or_else(|err| {
        TaskRuntime::new_current_thread().map_err(|fallback| {
            anyhow!(
                "failed to create multi-thread runtime ({}) and current-thread fallback ({})",
                err,
                fallback
            )
        })
    })
}

/// Process-wide runtime, created on first use.
///
/// Honors `KIT_SINGLE_THREAD` and falls back to a current-thread scheduler
/// when worker threads cannot be started.
pub fn shared_runtime() -> Result<Arc<TaskRuntime>> {
    let mut slot = SHARED_RUNTIME.lock().unwrap_or_else(|p| p.into_inner());
    if let Some(rt) = slot.as_ref() {
        return Ok(rt.clone());
    }
    let rt = Arc::new(create_runtime()?);
    *slot = Some(rt.clone());
    Ok(rt)
}
