//! Embedded runtime seam
//!
//! The worker drives any engine through [`EmbeddedRuntime`]. The CPython
//! implementation lives in `python` (feature `python`); tests substitute a
//! recording mock.

#[cfg(feature = "python")]
pub mod python;

#[cfg(feature = "python")]
pub use python::PythonRuntime;

use crate::config::{EnvExports, PathSet};
use crate::errors::Result;

/// Configuration handed to the runtime's initialization entry point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub home: String,
    /// Appended in order to the runtime's module search paths
    pub module_search_paths: Vec<String>,
}

impl RuntimeConfig {
    pub fn from_paths(paths: &PathSet) -> Self {
        Self {
            home: paths.home.clone(),
            module_search_paths: paths.search_paths(),
        }
    }
}

/// Process-wide embedded scripting engine
///
/// Initialization is single-use: once `finalize` has run, implementations
/// must refuse to initialize again within the same process.
pub trait EmbeddedRuntime: Send + Sync + 'static {
    /// Publish environment variables the runtime's own discovery reads
    fn export_environment(&self, exports: &EnvExports) {
        for (name, value) in exports.vars() {
            std::env::set_var(name, value);
        }
    }

    /// Initialize the runtime. The calling thread holds the exclusivity lock
    /// afterwards.
    fn initialize(&self, config: &RuntimeConfig) -> Result<()>;

    /// Run `idle` with the exclusivity lock released, then reacquire it.
    /// Errors surfacing from the runtime once the lock is back are returned as
    /// `Error::WorkerLoop`.
    fn release_lock(&self, idle: &mut dyn FnMut()) -> Result<()>;

    /// Tear the runtime down. Irreversible within the process.
    fn finalize(&self) -> Result<()>;
}

impl<T: EmbeddedRuntime> EmbeddedRuntime for std::sync::Arc<T> {
    fn export_environment(&self, exports: &EnvExports) {
        (**self).export_environment(exports)
    }

    fn initialize(&self, config: &RuntimeConfig) -> Result<()> {
        (**self).initialize(config)
    }

    fn release_lock(&self, idle: &mut dyn FnMut()) -> Result<()> {
        (**self).release_lock(idle)
    }

    fn finalize(&self) -> Result<()> {
        (**self).finalize()
    }
}
