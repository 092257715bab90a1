//! Error taxonomy for the interpreter lifecycle
//!
//! Every failure is terminal for the start attempt that produced it. Only
//! `Spawn` ever reaches a caller of `start()`; the others are logged by the
//! worker thread that hit them.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Step of runtime initialization that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    /// Setting the runtime home directory
    Home,
    /// Appending an entry to the module search paths
    SearchPath,
    /// The runtime's own initialization entry point
    Initialize,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => write!(f, "failed to set runtime home directory"),
            Self::SearchPath => write!(f, "failed to append module search path"),
            Self::Initialize => write!(f, "failed to initialize runtime"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file missing or unreadable; callers continue with an empty store
    #[error("failed to load configuration file {}: {source}", path.display())]
    ConfigLoad {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Fatal to the worker; `message` is the runtime's native error text
    #[error("{stage}: {message}")]
    RuntimeInit { stage: InitStage, message: String },

    /// Raised inside the idle loop; ends the loop and proceeds to finalize
    #[error("interpreter loop failed: {0}")]
    WorkerLoop(String),

    /// The worker thread could not be created
    #[error("failed to spawn interpreter thread: {0}")]
    Spawn(#[source] io::Error),

    /// The loaded module could not determine its own location
    #[error("unable to locate host module: {0}")]
    ModuleLocation(String),
}

impl Error {
    pub fn runtime_init(stage: InitStage, message: impl Into<String>) -> Self {
        Self::RuntimeInit {
            stage,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_init_message_keeps_native_text() {
        let err = Error::runtime_init(InitStage::Initialize, "invalid home");
        assert_eq!(err.to_string(), "failed to initialize runtime: invalid home");
    }

    #[test]
    fn test_config_load_names_path() {
        let err = Error::ConfigLoad {
            path: PathBuf::from("missing/PyFX.config"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        let text = err.to_string();
        assert!(text.contains("PyFX.config"));
        assert!(text.contains("not found"));
    }
}
