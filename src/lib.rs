//! PyFX - lifecycle controller for an embedded Python interpreter
//!
//! The loadable `pyfx-module` drives this library: on load its host hooks
//! start a dedicated interpreter thread, on unload they stop it. Linking the
//! library has no load-time side effects; the same start/stop/running API is
//! available to manual callers.

// Core modules
pub mod config;
pub mod controller;
pub mod errors;
pub mod host;
pub mod infrastructure;
pub mod runtime;
pub mod worker;

// Re-export commonly used items
pub use config::{ConfigStore, EnvExports, PathSet, CONFIG_FILE_NAME};
pub use controller::{LifecycleController, RunState, Status};
pub use errors::{Error, InitStage, Result};
pub use host::{HostEvent, HostHooks};
pub use infrastructure::{
    init_file_logging, init_logging, init_module_logging, LogConfig, LogFormat, LogOutput,
};
pub use runtime::{EmbeddedRuntime, RuntimeConfig};
pub use worker::{ConfigLocation, InterpreterWorker, WorkerExit, WorkerOptions};

#[cfg(feature = "python")]
pub use runtime::PythonRuntime;
