//! Small helpers around raw libc calls.

use std::ffi::CString;
use std::io;

/// How many times a call interrupted by a signal is retried before giving up.
pub const MAX_EINTR_RETRIES: usize = 16;

/// Turns a `-1`-on-error return into an `io::Result`.
pub fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// Runs `f` again while it fails with `EINTR`, at most `MAX_EINTR_RETRIES` times.
pub fn retry_interrupted<T>(mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted && attempts < MAX_EINTR_RETRIES => {
                attempts += 1;
                tracing::debug!(attempt = attempts, "Interrupted system call, retrying");
            }
            other => return other,
        }
    }
}

/// Builds a POSIX IPC object name (`/name`).
pub fn ipc_name(name: &str) -> io::Result<CString> {
    let name = if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    };
    CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

pub fn getpid() -> libc::pid_t {
    unsafe { libc::getpid() }
}
