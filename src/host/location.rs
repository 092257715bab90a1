//! Self-discovery of the loaded module's file

use std::path::PathBuf;

use crate::errors::{Error, Result};

/// Directory containing the module this code was loaded from
pub fn module_dir() -> Result<PathBuf> {
    let path = module_path()?;
    path.parent()
        .map(|dir| dir.to_path_buf())
        .ok_or_else(|| Error::ModuleLocation(format!("{} has no parent directory", path.display())))
}

/// Full path of the shared object (or executable) containing this function
#[cfg(unix)]
pub fn module_path() -> Result<PathBuf> {
    use std::ffi::{CStr, OsStr};
    use std::os::unix::ffi::OsStrExt;

    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    let addr = module_path as *const libc::c_void;

    if unsafe { libc::dladdr(addr, &mut info) } == 0 || info.dli_fname.is_null() {
        return Err(Error::ModuleLocation("dladdr could not resolve module address".into()));
    }

    let name = unsafe { CStr::from_ptr(info.dli_fname) }.to_bytes();
    let path = PathBuf::from(OsStr::from_bytes(name));

    // The main program may be reported by its invocation name
    if path.is_absolute() {
        Ok(path)
    } else {
        std::env::current_exe().map_err(|e| Error::ModuleLocation(e.to_string()))
    }
}

/// Full path of the DLL (or executable) containing this function
#[cfg(windows)]
pub fn module_path() -> Result<PathBuf> {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use std::ptr;
    use winapi::shared::minwindef::{HMODULE, MAX_PATH};
    use winapi::um::libloaderapi::{
        GetModuleFileNameW, GetModuleHandleExW, GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS,
        GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
    };

    let mut module: HMODULE = ptr::null_mut();
    let flags = GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS | GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT;
    let found = unsafe { GetModuleHandleExW(flags, module_path as *const u16, &mut module) };
    if found == 0 {
        return Err(Error::ModuleLocation(std::io::Error::last_os_error().to_string()));
    }

    let mut buf = vec![0u16; MAX_PATH];
    loop {
        let len = unsafe { GetModuleFileNameW(module, buf.as_mut_ptr(), buf.len() as u32) } as usize;
        if len == 0 {
            return Err(Error::ModuleLocation(std::io::Error::last_os_error().to_string()));
        }
        if len < buf.len() {
            buf.truncate(len);
            break;
        }
        // Truncated; retry with a larger buffer
        buf.resize(buf.len() * 2, 0);
    }

    Ok(PathBuf::from(OsString::from_wide(&buf)))
}

#[cfg(not(any(unix, windows)))]
pub fn module_path() -> Result<PathBuf> {
    Err(Error::ModuleLocation("module discovery is not supported on this platform".into()))
}
