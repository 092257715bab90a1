//! Ambient infrastructure shared by the module and the CLI

pub mod logging;

pub use logging::{
    init_file_logging, init_logging, init_module_logging, LogConfig, LogFormat, LogOutput,
};
