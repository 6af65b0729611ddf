//! The real bridge, loaded from a shared library at runtime.
//!
//! Exports (cdecl):
//!
//! ```text
//! void         Initialize(void);
//! ClientInfo*  GetClients(void);
//! char*        Compilable(const char* source);
//! void         Execute(const char* source, const char** names, int count);
//! ```
//!
//! `Compilable` returns a heap buffer the caller must free; on Windows it
//! comes from the COM task allocator, elsewhere from `malloc`. The library is
//! never unloaded, so resolved symbols stay valid for the life of the process.
//!
//! The list returned by `GetClients` lives until the next `GetClients` call,
//! so enumerations must not overlap. `SharedRegistry::refresh_from` holds its
//! fetch lock across the whole scan.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::sync::Once;

use sc_common::ClientRecord;

use super::raw::{self, RawClientInfo};
use super::{
    Boundary, BoundaryCall, BoundaryError, EnumerationError, Enumerator, Executor, Validator,
};

type InitializeFn = unsafe extern "C" fn();
type GetClientsFn = unsafe extern "C" fn() -> *const RawClientInfo;
type CompilableFn = unsafe extern "C" fn(*const c_char) -> *mut c_char;
type ExecuteFn = unsafe extern "C" fn(*const c_char, *const *const c_char, c_int);

/// Bridge state is process-wide, so initialization is too.
static INITIALIZE: Once = Once::new();

/// Platform file name of the bridge library.
pub fn default_library_name() -> String {
    format!(
        "{}scbridge{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    )
}

/// Resolved entry points of a loaded bridge library.
pub struct NativeBoundary {
    initialize: InitializeFn,
    get_clients: GetClientsFn,
    compilable: CompilableFn,
    execute: ExecuteFn,
}

impl NativeBoundary {
    /// Load the library at `path` and resolve every export.
    pub fn load(path: &str) -> Result<Self, BoundaryError> {
        let handle = sys::open(path).map_err(BoundaryError::Unavailable)?;

        // SAFETY: the symbols are the bridge's documented exports and the
        // fn types above match their C signatures.
        unsafe {
            Ok(NativeBoundary {
                initialize: std::mem::transmute::<*mut c_void, InitializeFn>(resolve(
                    handle,
                    "Initialize",
                )?),
                get_clients: std::mem::transmute::<*mut c_void, GetClientsFn>(resolve(
                    handle,
                    "GetClients",
                )?),
                compilable: std::mem::transmute::<*mut c_void, CompilableFn>(resolve(
                    handle,
                    "Compilable",
                )?),
                execute: std::mem::transmute::<*mut c_void, ExecuteFn>(resolve(
                    handle, "Execute",
                )?),
            })
        }
    }
}

fn resolve(handle: sys::Handle, name: &str) -> Result<*mut c_void, BoundaryError> {
    sys::symbol(handle, name)
        .map_err(|e| BoundaryError::Unavailable(format!("missing export {}: {}", name, e)))
}

/// Status text allocated by `Compilable`, released on drop.
struct OwnedStatus(*mut c_char);

impl OwnedStatus {
    fn text(&self) -> String {
        // SAFETY: non-null and NUL-terminated per the bridge contract.
        let bytes = unsafe { CStr::from_ptr(self.0) }.to_bytes();
        raw::decode_single_byte(bytes)
    }
}

impl Drop for OwnedStatus {
    fn drop(&mut self) {
        // SAFETY: ownership of the buffer was transferred by `Compilable`.
        unsafe { sys::free_result(self.0.cast()) };
    }
}

impl Enumerator for NativeBoundary {
    fn enumerate(&self, max_records: usize) -> Result<Vec<ClientRecord>, EnumerationError> {
        self.initialize()?;
        // SAFETY: GetClients returns a terminator-ended array owned by the
        // bridge that stays valid until the next GetClients call; the scan
        // copies it before returning.
        unsafe {
            let list = (self.get_clients)();
            raw::scan_client_list(list, max_records)
        }
    }
}

impl Validator for NativeBoundary {
    fn validate(&self, source: &[u8]) -> Result<String, BoundaryError> {
        self.initialize()?;
        let buffer = raw::nul_terminated(source.to_vec());
        // SAFETY: `buffer` outlives the call.
        let status = unsafe { (self.compilable)(buffer.as_ptr()) };
        if status.is_null() {
            return Err(BoundaryError::call_failed(
                BoundaryCall::Validate,
                "validator returned a null status",
            ));
        }
        Ok(OwnedStatus(status).text())
    }
}

impl Executor for NativeBoundary {
    fn execute(&self, source: &[u8], targets: &[Vec<u8>]) -> Result<(), BoundaryError> {
        self.initialize()?;
        let count = c_int::try_from(targets.len()).map_err(|_| {
            BoundaryError::call_failed(
                BoundaryCall::Execute,
                format!("{} targets exceed the bridge limit", targets.len()),
            )
        })?;

        let source = raw::nul_terminated(source.to_vec());
        let names: Vec<CString> = targets
            .iter()
            .map(|name| raw::nul_terminated(name.clone()))
            .collect();
        let pointers: Vec<*const c_char> = names.iter().map(|n| n.as_ptr()).collect();

        // SAFETY: every buffer lives until after the call returns.
        unsafe { (self.execute)(source.as_ptr(), pointers.as_ptr(), count) };
        Ok(())
    }
}

impl Boundary for NativeBoundary {
    fn name(&self) -> &'static str {
        "native"
    }

    fn initialize(&self) -> Result<(), BoundaryError> {
        let init = self.initialize;
        // SAFETY: Initialize takes no arguments and runs once per process.
        INITIALIZE.call_once(|| unsafe { init() });
        Ok(())
    }
}

#[cfg(unix)]
mod sys {
    use std::ffi::{CStr, CString};
    use std::os::raw::c_void;

    #[derive(Clone, Copy)]
    pub struct Handle(*mut c_void);

    pub fn open(path: &str) -> Result<Handle, String> {
        let c_path = CString::new(path).map_err(|_| format!("invalid library path {:?}", path))?;
        // SAFETY: c_path is a valid C string.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(format!("cannot load {}: {}", path, last_error()));
        }
        Ok(Handle(handle))
    }

    pub fn symbol(handle: Handle, name: &str) -> Result<*mut c_void, String> {
        let c_name = CString::new(name).map_err(|_| "invalid symbol name".to_string())?;
        // SAFETY: handle came from dlopen and is never closed.
        let sym = unsafe { libc::dlsym(handle.0, c_name.as_ptr()) };
        if sym.is_null() {
            return Err(last_error());
        }
        Ok(sym)
    }

    /// # Safety
    /// `ptr` must come from `malloc` and not be freed elsewhere.
    pub unsafe fn free_result(ptr: *mut c_void) {
        libc::free(ptr);
    }

    fn last_error() -> String {
        // SAFETY: dlerror returns null or a thread-local C string.
        let err = unsafe { libc::dlerror() };
        if err.is_null() {
            "unknown dynamic loader error".to_string()
        } else {
            unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
        }
    }
}

#[cfg(windows)]
mod sys {
    use std::ffi::CString;
    use std::os::raw::{c_char, c_void};

    #[link(name = "kernel32")]
    extern "system" {
        fn LoadLibraryA(name: *const c_char) -> *mut c_void;
        fn GetProcAddress(module: *mut c_void, name: *const c_char) -> *mut c_void;
        fn GetLastError() -> u32;
    }

    #[link(name = "ole32")]
    extern "system" {
        fn CoTaskMemFree(ptr: *mut c_void);
    }

    #[derive(Clone, Copy)]
    pub struct Handle(*mut c_void);

    pub fn open(path: &str) -> Result<Handle, String> {
        let c_path = CString::new(path).map_err(|_| format!("invalid library path {:?}", path))?;
        // SAFETY: c_path is a valid C string.
        let module = unsafe { LoadLibraryA(c_path.as_ptr()) };
        if module.is_null() {
            // SAFETY: no preconditions.
            let code = unsafe { GetLastError() };
            return Err(format!("cannot load {}: error {}", path, code));
        }
        Ok(Handle(module))
    }

    pub fn symbol(handle: Handle, name: &str) -> Result<*mut c_void, String> {
        let c_name = CString::new(name).map_err(|_| "invalid symbol name".to_string())?;
        // SAFETY: handle came from LoadLibraryA and is never freed.
        let sym = unsafe { GetProcAddress(handle.0, c_name.as_ptr()) };
        if sym.is_null() {
            // SAFETY: no preconditions.
            let code = unsafe { GetLastError() };
            return Err(format!("error {}", code));
        }
        Ok(sym)
    }

    /// # Safety
    /// `ptr` must come from the COM task allocator.
    pub unsafe fn free_result(ptr: *mut c_void) {
        CoTaskMemFree(ptr);
    }
}
