//! Process-scope module instance and exported entry points
//!
//! The platform loader hooks below forward to the same `HostHooks` instance
//! the C API drives, so both surfaces share one lifecycle.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;

use pyfx::{init_module_logging, HostEvent, HostHooks, LifecycleController, PythonRuntime, Status};

static MODULE: Lazy<HostHooks<PythonRuntime>> =
    Lazy::new(|| HostHooks::new(LifecycleController::new(PythonRuntime::new())));

static LOG_GUARD: Lazy<Mutex<Option<WorkerGuard>>> = Lazy::new(|| Mutex::new(None));

fn on_load() -> bool {
    {
        let mut guard = LOG_GUARD.lock();
        if guard.is_none() {
            *guard = init_module_logging();
        }
    }
    MODULE.handle(HostEvent::Attach)
}

fn on_unload() {
    // Runs inside exit() on ELF targets, after this thread's locals are gone
    MODULE.unload();
    // Flush buffered log lines before the module goes away
    LOG_GUARD.lock().take();
}

/// True while the run flag is set
#[no_mangle]
pub extern "C" fn pyfx_running() -> bool {
    MODULE.controller().running()
}

/// 0 = stopped, 1 = running, 2 = runtime failed to initialize
#[no_mangle]
pub extern "C" fn pyfx_status() -> i32 {
    match MODULE.controller().status() {
        Status::Stopped => 0,
        Status::Running => 1,
        Status::Failed => 2,
    }
}

/// Returns 0 on success, -1 if the interpreter thread could not be spawned
#[no_mangle]
pub extern "C" fn pyfx_start() -> i32 {
    match MODULE.controller().start() {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "pyfx_start failed");
            -1
        }
    }
}

/// Blocks until the interpreter thread has finalized the runtime
#[no_mangle]
pub extern "C" fn pyfx_stop() {
    MODULE.controller().stop();
}

#[cfg(windows)]
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn DllMain(
    _module: winapi::shared::minwindef::HINSTANCE,
    reason: winapi::shared::minwindef::DWORD,
    _reserved: winapi::shared::minwindef::LPVOID,
) -> winapi::shared::minwindef::BOOL {
    use winapi::shared::minwindef::{FALSE, TRUE};
    use winapi::um::winnt::{
        DLL_PROCESS_ATTACH, DLL_PROCESS_DETACH, DLL_THREAD_ATTACH, DLL_THREAD_DETACH,
    };

    let ok = match reason {
        DLL_PROCESS_ATTACH => on_load(),
        DLL_PROCESS_DETACH => {
            on_unload();
            true
        }
        DLL_THREAD_ATTACH => MODULE.handle(HostEvent::ThreadAttach),
        DLL_THREAD_DETACH => MODULE.handle(HostEvent::ThreadDetach),
        _ => true,
    };

    if ok {
        TRUE
    } else {
        FALSE
    }
}

#[cfg(target_os = "linux")]
mod elf_hooks {
    extern "C" fn load_hook() {
        // ELF constructors cannot veto a load; the failure is already logged
        let _ = super::on_load();
    }

    extern "C" fn unload_hook() {
        super::on_unload();
    }

    #[used]
    #[link_section = ".init_array"]
    static LOAD_HOOK: extern "C" fn() = load_hook;

    #[used]
    #[link_section = ".fini_array"]
    static UNLOAD_HOOK: extern "C" fn() = unload_hook;
}
