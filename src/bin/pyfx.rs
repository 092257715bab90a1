use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pyfx::{
    init_file_logging, init_logging, ConfigStore, LogConfig, LogFormat, PathSet, CONFIG_FILE_NAME,
};
use serde::Serialize;
use tracing::{debug, error, Level};

#[derive(Parser)]
#[command(name = "pyfx")]
#[command(about = "PyFX - embedded Python lifecycle controller", long_about = None)]
struct Cli {
    /// Log format: pretty, compact or json
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write debug-level JSON logs to daily files in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the search paths and environment derived from a config file
    Paths {
        /// Configuration file (default: PyFX.config in the current directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Start the interpreter, wait for a line on stdin, then stop it
    Run {
        /// Configuration file (default: PyFX.config in the current directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Idle loop lock-release interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
    },
}

#[derive(Serialize)]
struct PathsReport<'a> {
    config: String,
    loaded: bool,
    keys: Vec<&'a str>,
    paths: &'a PathSet,
    search_paths: Vec<String>,
    environment: pyfx::EnvExports,
}

fn config_path(config: Option<PathBuf>) -> PathBuf {
    config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

fn print_paths(config: PathBuf, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (store, loaded) = match ConfigStore::load(&config) {
        Ok(store) => (store, true),
        Err(e) => {
            error!(error = %e, "continuing with empty configuration");
            (ConfigStore::empty(), false)
        }
    };

    let paths = PathSet::resolve(&store);
    let report = PathsReport {
        config: config.display().to_string(),
        loaded,
        keys: store.keys(),
        paths: &paths,
        search_paths: paths.search_paths(),
        environment: paths.environment(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("config: {}{}", report.config, if loaded { "" } else { " (not loaded)" });
    println!("keys:");
    for key in &report.keys {
        println!("  {}", key);
    }
    println!("search paths:");
    for (index, path) in report.search_paths.iter().enumerate() {
        println!("  {}. {}", index + 1, path);
    }
    println!("environment:");
    for (name, value) in report.environment.vars() {
        println!("  {}={}", name, value);
    }
    Ok(())
}

#[cfg(feature = "python")]
fn run(config: PathBuf, interval_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    use pyfx::{LifecycleController, PythonRuntime, Status, WorkerOptions};
    use std::io::BufRead;
    use std::time::Duration;
    use tracing::info;

    let options = WorkerOptions::new()
        .with_config_file(config)
        .with_idle_interval(Duration::from_millis(interval_ms));
    let controller = LifecycleController::with_options(PythonRuntime::new(), options);

    controller.start()?;
    info!("interpreter started, press Enter to stop");

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    if controller.status() == Status::Failed {
        error!("runtime failed to initialize");
    }
    controller.stop();
    info!("interpreter stopped");
    Ok(())
}

#[cfg(not(feature = "python"))]
fn run(_config: PathBuf, _interval_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    Err("pyfx was built without the `python` feature".into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let _guard = match &cli.log_dir {
        Some(dir) => init_file_logging(dir),
        None => {
            let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
            init_logging(LogConfig::new().with_level(level).with_format(cli.log_format))
        }
    };
    debug!("pyfx CLI starting");

    match cli.command {
        Commands::Paths { config, json } => print_paths(config_path(config), json),
        Commands::Run { config, interval_ms } => run(config_path(config), interval_ms),
    }
}
