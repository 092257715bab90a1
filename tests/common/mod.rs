//! Recording runtime used by the integration tests

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pyfx::{EmbeddedRuntime, EnvExports, Error, InitStage, Result, RuntimeConfig, WorkerOptions};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ExportEnvironment(EnvExports),
    Initialize(RuntimeConfig),
    ReleaseLock,
    Finalize,
}

#[derive(Debug, Default)]
pub struct MockRuntime {
    calls: Mutex<Vec<(Call, Instant)>>,
    /// Number of upcoming `initialize` calls that fail
    init_failures: AtomicUsize,
    /// Fail `release_lock` once this many windows have completed
    fail_loop_after: Option<usize>,
    /// Panic in the lock window once this many windows have completed
    panic_loop_after: Option<usize>,
    finalize_delay: Duration,
    windows: AtomicUsize,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_init(self, times: usize) -> Self {
        self.init_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn failing_loop_after(mut self, windows: usize) -> Self {
        self.fail_loop_after = Some(windows);
        self
    }

    pub fn panicking_loop_after(mut self, windows: usize) -> Self {
        self.panic_loop_after = Some(windows);
        self
    }

    pub fn with_finalize_delay(mut self, delay: Duration) -> Self {
        self.finalize_delay = delay;
        self
    }

    fn record(&self, call: Call) {
        self.calls.lock().push((call, Instant::now()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().iter().map(|(call, _)| call.clone()).collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|(call, _)| pred(call)).count()
    }

    pub fn initializations(&self) -> usize {
        self.count(|c| matches!(c, Call::Initialize(_)))
    }

    pub fn finalizations(&self) -> usize {
        self.count(|c| matches!(c, Call::Finalize))
    }

    pub fn last_time(&self, pred: impl Fn(&Call) -> bool) -> Option<Instant> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|(call, _)| pred(call))
            .map(|(_, at)| *at)
    }

    /// Poll until `pred` holds or `timeout` passes
    pub fn wait_for(&self, timeout: Duration, pred: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if pred(self) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        pred(self)
    }
}

impl EmbeddedRuntime for MockRuntime {
    fn export_environment(&self, exports: &EnvExports) {
        self.record(Call::ExportEnvironment(exports.clone()));
    }

    fn initialize(&self, config: &RuntimeConfig) -> Result<()> {
        self.record(Call::Initialize(config.clone()));

        let remaining = self.init_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.init_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::runtime_init(InitStage::Home, "invalid home"));
        }
        Ok(())
    }

    fn release_lock(&self, idle: &mut dyn FnMut()) -> Result<()> {
        let completed = self.windows.load(Ordering::SeqCst);
        if self.panic_loop_after == Some(completed) {
            panic!("scripted panic in lock window");
        }

        self.record(Call::ReleaseLock);
        idle();
        self.windows.fetch_add(1, Ordering::SeqCst);

        if self.fail_loop_after == Some(completed + 1) {
            return Err(Error::WorkerLoop("scripted exception".into()));
        }
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        std::thread::sleep(self.finalize_delay);
        self.record(Call::Finalize);
        Ok(())
    }
}

/// A config file in a fresh temp dir; keep the `TempDir` alive
pub fn config_file(content: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(pyfx::CONFIG_FILE_NAME);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    (dir, path)
}

pub const SAMPLE_CONFIG: &str = r#"
# runtime layout
[Paths]
python_home_dir = C:\rt
lib_dir = C:\rt\lib
site_packages_dir = C:\rt\site
"#;

pub fn options(config: PathBuf, interval: Duration) -> WorkerOptions {
    WorkerOptions::new()
        .with_config_file(config)
        .with_idle_interval(interval)
}

/// Stack size no thread can be created with, so spawning the worker fails
pub const UNSPAWNABLE_STACK: usize = usize::MAX;
