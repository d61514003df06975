use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use super::sys::{cvt, getpid, ipc_name};

/// A boolean living in a named shared-memory segment.
///
/// The mapping is `MAP_SHARED`, so forked children see every store made by
/// the parent after the fork. Only the creating process unlinks the segment.
pub struct SharedFlag {
    name: String,
    fd: libc::c_int,
    flag: *const AtomicBool,
    owner: libc::pid_t,
}

unsafe impl Send for SharedFlag {}
unsafe impl Sync for SharedFlag {}

impl SharedFlag {
    pub fn create(name: &str, initial: bool) -> io::Result<Self> {
        let cname = ipc_name(name)?;
        let len = std::mem::size_of::<AtomicBool>();

        unsafe {
            libc::shm_unlink(cname.as_ptr());
        }
        let fd = cvt(unsafe {
            libc::shm_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600 as libc::mode_t,
            )
        })?;

        let mapped = (|| -> io::Result<*const AtomicBool> {
            cvt(unsafe { libc::ftruncate(fd, len as libc::off_t) })?;
            let ptr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED,
                    fd,
                    0,
                )
            };
            if ptr == libc::MAP_FAILED {
                return Err(io::Error::last_os_error());
            }
            Ok(ptr as *const AtomicBool)
        })();

        let flag = match mapped {
            Ok(flag) => flag,
            Err(e) => {
                unsafe {
                    libc::close(fd);
                    libc::shm_unlink(cname.as_ptr());
                }
                return Err(e);
            }
        };

        let shared = Self {
            name: cname.to_string_lossy().into_owned(),
            fd,
            flag,
            owner: getpid(),
        };
        shared.store(initial);
        Ok(shared)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn load(&self) -> bool {
        unsafe { (*self.flag).load(Ordering::Acquire) }
    }

    pub fn store(&self, value: bool) {
        unsafe { (*self.flag).store(value, Ordering::Release) }
    }

    /// Stores `value` and returns what was there before.
    pub fn swap(&self, value: bool) -> bool {
        unsafe { (*self.flag).swap(value, Ordering::AcqRel) }
    }

    /// Removes the segment's name. Existing mappings stay valid. Only the
    /// owning process unlinks.
    pub fn unlink(&self) {
        if getpid() != self.owner {
            return;
        }
        if let Ok(cname) = ipc_name(&self.name) {
            unsafe {
                libc::shm_unlink(cname.as_ptr());
            }
        }
    }
}

impl Drop for SharedFlag {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.flag as *mut libc::c_void, std::mem::size_of::<AtomicBool>());
            libc::close(self.fd);
        }
        self.unlink();
    }
}
