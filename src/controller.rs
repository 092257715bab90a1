//! Lifecycle controller for the interpreter worker
//!
//! One controller owns at most one worker thread. The start/stop transition
//! is serialized by a mutex that also owns the join handle; `running()` is a
//! lock-free read of the shared flag.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::errors::{Error, Result};
use crate::runtime::EmbeddedRuntime;
use crate::worker::{InterpreterWorker, WorkerExit, WorkerOptions, WORKER_THREAD_NAME};

/// Observable lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Stopped,
    Running,
    /// The run flag is still set but the worker exited during runtime init
    Failed,
}

/// Run flag shared between the controller and its worker
///
/// The flag and the failure marker are one atomic, so `status()` never
/// observes a half-applied transition. Writers hold `lock` so a worker
/// waiting on `wake` cannot miss the transition to stopped.
#[derive(Debug, Default)]
pub struct RunState {
    status: AtomicU8,
    lock: Mutex<()>,
    wake: Condvar,
}

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;
const FAILED: u8 = 2;

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the flag is set, including after a runtime init failure
    #[inline]
    pub fn is_running(&self) -> bool {
        self.status.load(Ordering::Acquire) != STOPPED
    }

    pub fn status(&self) -> Status {
        match self.status.load(Ordering::Acquire) {
            RUNNING => Status::Running,
            FAILED => Status::Failed,
            _ => Status::Stopped,
        }
    }

    /// Set the flag for a new worker run
    pub fn begin(&self) {
        let _guard = self.lock.lock();
        self.status.store(RUNNING, Ordering::Release);
    }

    /// Clear the flag and wake a waiting worker
    pub fn clear(&self) {
        let _guard = self.lock.lock();
        self.status.store(STOPPED, Ordering::Release);
        self.wake.notify_all();
    }

    /// Record a runtime init failure. Leaves the run flag set; a no-op once
    /// the flag has been cleared.
    pub fn mark_failed(&self) {
        let _guard = self.lock.lock();
        let _ = self
            .status
            .compare_exchange(RUNNING, FAILED, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Block for up to `interval`, returning early once the flag clears
    pub fn wait_while_running(&self, interval: Duration) {
        let mut guard = self.lock.lock();
        if self.is_running() {
            let _ = self.wake.wait_for(&mut guard, interval);
        }
    }
}

pub struct LifecycleController<R: EmbeddedRuntime> {
    state: Arc<RunState>,
    runtime: Arc<R>,
    options: WorkerOptions,
    worker: Mutex<Option<JoinHandle<WorkerExit>>>,
}

impl<R: EmbeddedRuntime> LifecycleController<R> {
    pub fn new(runtime: R) -> Self {
        Self::with_options(runtime, WorkerOptions::default())
    }

    pub fn with_options(runtime: R, options: WorkerOptions) -> Self {
        Self {
            state: Arc::new(RunState::new()),
            runtime: Arc::new(runtime),
            options,
            worker: Mutex::new(None),
        }
    }

    /// Non-blocking read of the run flag.
    ///
    /// Stays true after a runtime init failure until `stop()` is called; use
    /// [`status`](Self::status) to tell the two apart.
    pub fn running(&self) -> bool {
        self.state.is_running()
    }

    pub fn status(&self) -> Status {
        self.state.status()
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    /// Spawn the worker unless already running. Does not wait for the
    /// runtime to come up.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if self.state.is_running() {
            debug!(status = ?self.state.status(), "start ignored, already running");
            return Ok(());
        }

        // A worker that stopped itself after a loop failure may still be finalizing
        if let Some(stale) = worker.take() {
            join_worker(stale);
        }

        self.state.begin();
        let body = InterpreterWorker::new(
            Arc::clone(&self.runtime),
            Arc::clone(&self.state),
            self.options.clone(),
        );

        let mut builder = thread::Builder::new().name(WORKER_THREAD_NAME.to_string());
        if let Some(bytes) = self.options.stack_size {
            builder = builder.stack_size(bytes);
        }
        let spawned = builder.spawn(move || body.run());

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                info!("interpreter thread started");
                Ok(())
            }
            Err(e) => {
                self.state.clear();
                error!(error = %e, "failed to spawn interpreter thread");
                Err(Error::Spawn(e))
            }
        }
    }

    /// Clear the run flag and join the worker. No-op when never started.
    ///
    /// Blocks until the worker has finalized the runtime.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        if !self.state.is_running() {
            // Reap a worker that cleared the flag itself after a loop failure
            if let Some(stale) = worker.take() {
                join_worker(stale);
            }
            return;
        }

        self.state.clear();
        let Some(handle) = worker.take() else {
            warn!("run flag was set without a worker thread");
            return;
        };

        join_worker(handle);
    }
}

fn join_worker(handle: JoinHandle<WorkerExit>) {
    match handle.join() {
        Ok(exit) => info!(?exit, "interpreter thread joined"),
        Err(_) => error!("interpreter thread panicked"),
    }
}

impl<R: EmbeddedRuntime> Drop for LifecycleController<R> {
    fn drop(&mut self) {
        self.stop();
    }
}
