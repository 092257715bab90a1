//! CPython as the embedded runtime
//!
//! Uses the PEP 587 initialization API through `pyo3::ffi` rather than pyo3's
//! `prepare_freethreaded_python`, because the home directory and the module
//! search paths must be set before the interpreter starts.

use std::ffi::CStr;
use std::mem::MaybeUninit;
use std::os::raw::c_char;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use pyo3::ffi;
use tracing::{debug, info, warn};

use super::{EmbeddedRuntime, RuntimeConfig};
use crate::errors::{Error, InitStage, Result};

#[cfg(windows)]
type WideChar = u16;
#[cfg(not(windows))]
type WideChar = libc::wchar_t;

/// Set once this module has initialized CPython
static INITIALIZED: AtomicBool = AtomicBool::new(false);
/// Set once this module has finalized CPython; never cleared
static FINALIZED: AtomicBool = AtomicBool::new(false);

/// Handle to the process-wide CPython interpreter
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonRuntime;

impl PythonRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl EmbeddedRuntime for PythonRuntime {
    fn initialize(&self, config: &RuntimeConfig) -> Result<()> {
        if FINALIZED.load(Ordering::Acquire) {
            return Err(Error::runtime_init(
                InitStage::Initialize,
                "interpreter was already finalized in this process",
            ));
        }
        if unsafe { ffi::Py_IsInitialized() } != 0 {
            return Err(Error::runtime_init(
                InitStage::Initialize,
                "interpreter is already initialized in this process",
            ));
        }

        let mut raw = MaybeUninit::<ffi::PyConfig>::uninit();
        let mut py_config = unsafe {
            ffi::PyConfig_InitPythonConfig(raw.as_mut_ptr());
            raw.assume_init()
        };

        let result = unsafe { configure_and_start(&mut py_config, config) };
        unsafe { ffi::PyConfig_Clear(&mut py_config) };
        result?;

        INITIALIZED.store(true, Ordering::Release);
        info!(home = %config.home, "python interpreter initialized");
        Ok(())
    }

    fn release_lock(&self, idle: &mut dyn FnMut()) -> Result<()> {
        {
            let _released = ReleasedLock::new();
            idle();
        }

        match unsafe { take_pending_exception() } {
            Some(message) => Err(Error::WorkerLoop(message)),
            None => Ok(()),
        }
    }

    fn finalize(&self) -> Result<()> {
        if !INITIALIZED.swap(false, Ordering::AcqRel) {
            warn!("finalize requested but interpreter was never initialized here");
            return Ok(());
        }

        let status = unsafe { ffi::Py_FinalizeEx() };
        FINALIZED.store(true, Ordering::Release);

        if status < 0 {
            return Err(Error::WorkerLoop(
                "error while flushing buffered data during finalize".into(),
            ));
        }

        debug!("python interpreter finalized");
        Ok(())
    }
}

/// Applies `config` to `py_config` and starts the interpreter.
///
/// Caller owns `py_config` and must clear it afterwards.
unsafe fn configure_and_start(py_config: *mut ffi::PyConfig, config: &RuntimeConfig) -> Result<()> {
    let home = to_wide(&config.home);
    let status = ffi::PyConfig_SetString(py_config, ptr::addr_of_mut!((*py_config).home), home.as_ptr());
    check(status, InitStage::Home)?;

    for path in &config.module_search_paths {
        let wide = to_wide(path);
        let status = ffi::PyWideStringList_Append(
            ptr::addr_of_mut!((*py_config).module_search_paths),
            wide.as_ptr(),
        );
        check(status, InitStage::SearchPath)?;
        debug!(path = %path, "module search path appended");
    }
    (*py_config).module_search_paths_set = 1;

    let status = ffi::Py_InitializeFromConfig(py_config);
    check(status, InitStage::Initialize)
}

fn check(status: ffi::PyStatus, stage: InitStage) -> Result<()> {
    let err_msg = status.err_msg;
    if unsafe { ffi::PyStatus_Exception(status) } == 0 {
        return Ok(());
    }
    Err(Error::runtime_init(stage, unsafe { status_message(err_msg) }))
}

unsafe fn status_message(msg: *const c_char) -> String {
    if msg.is_null() {
        "unknown error".to_string()
    } else {
        CStr::from_ptr(msg).to_string_lossy().into_owned()
    }
}

#[cfg(windows)]
fn to_wide(s: &str) -> Vec<WideChar> {
    s.encode_utf16().chain(Some(0)).collect()
}

#[cfg(not(windows))]
fn to_wide(s: &str) -> Vec<WideChar> {
    s.chars().map(|c| c as WideChar).chain(Some(0)).collect()
}

/// Releases the GIL for its lifetime; restores it on drop, including unwinding
struct ReleasedLock(*mut ffi::PyThreadState);

impl ReleasedLock {
    fn new() -> Self {
        Self(unsafe { ffi::PyEval_SaveThread() })
    }
}

impl Drop for ReleasedLock {
    fn drop(&mut self) {
        unsafe { ffi::PyEval_RestoreThread(self.0) }
    }
}

/// Fetch and clear the current thread's pending exception, if any.
///
/// Must be called with the GIL held.
#[allow(deprecated)]
unsafe fn take_pending_exception() -> Option<String> {
    if ffi::PyErr_Occurred().is_null() {
        return None;
    }

    let mut ptype = ptr::null_mut();
    let mut pvalue = ptr::null_mut();
    let mut ptraceback = ptr::null_mut();
    ffi::PyErr_Fetch(&mut ptype, &mut pvalue, &mut ptraceback);

    let message = if pvalue.is_null() {
        "unknown exception".to_string()
    } else {
        let text = ffi::PyObject_Str(pvalue);
        if text.is_null() {
            ffi::PyErr_Clear();
            "<unprintable exception>".to_string()
        } else {
            let utf8 = ffi::PyUnicode_AsUTF8(text);
            let message = if utf8.is_null() {
                ffi::PyErr_Clear();
                "<unprintable exception>".to_string()
            } else {
                CStr::from_ptr(utf8).to_string_lossy().into_owned()
            };
            ffi::Py_DECREF(text);
            message
        }
    };

    ffi::Py_XDECREF(ptype);
    ffi::Py_XDECREF(pvalue);
    ffi::Py_XDECREF(ptraceback);
    Some(message)
}
