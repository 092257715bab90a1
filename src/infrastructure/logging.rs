//! Logging setup for the host module and the CLI
//!
//! Everything logs through `tracing`. The subscriber is installed with
//! `try_init` semantics: a host process that already installed one keeps it.

use std::path::Path;
use std::str::FromStr;

use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Filter directives, e.g. `pyfx=debug`
pub const LOG_FILTER_ENV: &str = "PYFX_LOG";
/// Directory for daily-rotated log files; unset means stderr
pub const LOG_DIR_ENV: &str = "PYFX_LOG_DIR";
/// `pretty`, `compact` or `json`
pub const LOG_FORMAT_ENV: &str = "PYFX_LOG_FORMAT";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with timestamps
    Pretty,
    /// Compact format for production
    Compact,
    /// JSON format for structured logging
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// File with daily rotation
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Whether to include span open/close events
    pub span_events: bool,
    /// Extra filter directives (e.g., "pyfx=debug")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Configuration for the loaded module, read from `PYFX_LOG*` variables
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(LOG_FILTER_ENV).ok(),
            std::env::var(LOG_DIR_ENV).ok(),
            std::env::var(LOG_FORMAT_ENV).ok(),
        )
    }

    fn from_vars(filter: Option<String>, directory: Option<String>, format: Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            config.filter = Some(filter);
        }
        if let Some(format) = format.and_then(|f| f.parse().ok()) {
            config.format = format;
        }
        if let Some(directory) = directory.filter(|d| !d.trim().is_empty()) {
            config.output = LogOutput::File {
                directory,
                prefix: "pyfx".to_string(),
            };
        }
        config
    }
}

/// Install the global subscriber
///
/// Returns a `WorkerGuard` that must be kept alive for as long as logs should
/// be flushed.
pub fn init_logging(config: LogConfig) -> Option<WorkerGuard> {
    let (writer, guard) = match &config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File { directory, prefix } => {
            tracing_appender::non_blocking(rolling::daily(directory, prefix))
        }
    };

    if install(writer, &config) {
        Some(guard)
    } else {
        None
    }
}

/// Initialize logging for a module loaded into a host process
pub fn init_module_logging() -> Option<WorkerGuard> {
    init_logging(LogConfig::from_env())
}

/// Initialize verbose JSON logging to daily files in `log_dir` (`pyfx --log-dir`)
pub fn init_file_logging(log_dir: impl AsRef<Path>) -> Option<WorkerGuard> {
    init_logging(file_logging_config(log_dir.as_ref()))
}

fn file_logging_config(log_dir: &Path) -> LogConfig {
    LogConfig::new()
        .with_level(Level::DEBUG)
        .with_format(LogFormat::Json)
        .with_output(LogOutput::File {
            directory: log_dir.to_string_lossy().into_owned(),
            prefix: "pyfx".to_string(),
        })
        .with_span_events(true)
}

fn install<W>(writer: W, config: &LogConfig) -> bool
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let span_events = span_events_config(config.span_events);
    let layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .pretty()
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(writer)
            .compact()
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .json()
            .with_span_events(span_events)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(build_filter(config)))
        .try_init()
        .is_ok()
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    match &config.filter {
        Some(filter_str) => filter_str
            .split(',')
            .map(str::trim)
            .filter(|directive| !directive.is_empty())
            .fold(base_filter, |filter, directive| match directive.parse() {
                Ok(parsed) => filter.add_directive(parsed),
                Err(_) => filter,
            }),
        None => base_filter,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}
