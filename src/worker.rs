//! Interpreter worker thread body
//!
//! Init -> Running -> Finalizing -> Exited. A runtime initialization failure
//! exits straight from Init without finalizing and without clearing the run
//! flag; the controller reports that as `Status::Failed`. A loop failure
//! clears the flag and finalizes, so it looks like an ordinary stop.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, info_span, warn};

use crate::config::{ConfigStore, PathSet, CONFIG_FILE_NAME};
use crate::controller::RunState;
use crate::errors::Result;
use crate::host::location;
use crate::runtime::{EmbeddedRuntime, RuntimeConfig};

pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(1);
pub const WORKER_THREAD_NAME: &str = "pyfx-interpreter";

/// Where the worker reads its configuration from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    /// `PyFX.config` in the directory of the loaded module
    BesideModule,
    /// An explicit file
    File(PathBuf),
}

impl ConfigLocation {
    /// Resolve to a file path. Module discovery failures fall back to the
    /// bare file name, which then fails to load like any missing file.
    pub fn resolve(&self) -> PathBuf {
        match self {
            Self::File(path) => path.clone(),
            Self::BesideModule => match location::module_dir() {
                Ok(dir) => dir.join(CONFIG_FILE_NAME),
                Err(e) => {
                    warn!(error = %e, "could not locate module directory");
                    PathBuf::from(CONFIG_FILE_NAME)
                }
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub config: ConfigLocation,
    /// Length of each lock release window in the idle loop
    pub idle_interval: Duration,
    /// Stack size of the interpreter thread; `None` keeps the platform default
    pub stack_size: Option<usize>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            config: ConfigLocation::BesideModule,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            stack_size: None,
        }
    }
}

impl WorkerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = ConfigLocation::File(path.into());
        self
    }

    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

/// How a worker run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Stop was requested; the runtime was finalized
    Stopped,
    /// The idle loop failed; the runtime was finalized
    LoopFailed,
    /// The runtime never came up; nothing was finalized
    InitFailed,
}

pub struct InterpreterWorker<R: EmbeddedRuntime> {
    runtime: Arc<R>,
    state: Arc<RunState>,
    options: WorkerOptions,
}

impl<R: EmbeddedRuntime> InterpreterWorker<R> {
    pub fn new(runtime: Arc<R>, state: Arc<RunState>, options: WorkerOptions) -> Self {
        Self {
            runtime,
            state,
            options,
        }
    }

    /// Thread body
    pub fn run(self) -> WorkerExit {
        let span = info_span!("interpreter_worker");
        let _enter = span.enter();

        let config = self.prepare();
        if let Err(e) = self.runtime.initialize(&config) {
            error!(error = %e, "interpreter thread exiting without starting the runtime");
            self.state.mark_failed();
            return WorkerExit::InitFailed;
        }
        info!(interval_ms = self.options.idle_interval.as_millis() as u64, "runtime running");

        let exit = match panic::catch_unwind(AssertUnwindSafe(|| self.idle_loop())) {
            Ok(Ok(())) => {
                debug!("stop requested, leaving idle loop");
                WorkerExit::Stopped
            }
            Ok(Err(e)) => {
                error!(error = %e, "exception in interpreter thread");
                self.state.clear();
                WorkerExit::LoopFailed
            }
            Err(payload) => {
                error!(error = %panic_message(payload.as_ref()), "panic in interpreter thread");
                self.state.clear();
                WorkerExit::LoopFailed
            }
        };

        if let Err(e) = self.runtime.finalize() {
            warn!(error = %e, "runtime finalize reported an error");
        }
        info!(?exit, "interpreter thread exited");
        exit
    }

    /// Load configuration, derive paths and publish the environment
    fn prepare(&self) -> RuntimeConfig {
        let path = self.options.config.resolve();
        let store = match ConfigStore::load(&path) {
            Ok(store) => store,
            Err(e) => {
                error!(error = %e, "continuing with empty configuration");
                ConfigStore::empty()
            }
        };

        let paths = PathSet::resolve(&store);
        self.runtime.export_environment(&paths.environment());
        debug!(home = %paths.home, archive = %paths.archive, "runtime paths resolved");

        RuntimeConfig::from_paths(&paths)
    }

    fn idle_loop(&self) -> Result<()> {
        let interval = self.options.idle_interval;
        while self.state.is_running() {
            self.runtime.release_lock(&mut || self.state.wait_while_running(interval))?;
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
