//! Counting semaphores for the handoff handshake.
//!
//! `NamedSemaphore` is a POSIX named semaphore that survives `fork`, used by
//! the process backend. `Semaphore` is the in-process equivalent used by the
//! thread backend. Both start at zero and every `post` releases exactly one
//! `wait`; extra posts queue up.

use std::io;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use super::sys::{cvt, getpid, ipc_name, retry_interrupted};

pub struct NamedSemaphore {
    name: String,
    sem: *mut libc::sem_t,
    owner: libc::pid_t,
}

// sem_t is built for concurrent use from any thread or process.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Creates a fresh semaphore with count 0, replacing any stale one of the
    /// same name. The calling process owns it and unlinks it on drop.
    pub fn create(name: &str) -> io::Result<Self> {
        let cname = ipc_name(name)?;
        unsafe {
            libc::sem_unlink(cname.as_ptr());
        }

        let sem = unsafe {
            libc::sem_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::c_uint,
                0 as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            name: cname.to_string_lossy().into_owned(),
            sem,
            owner: getpid(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn post(&self) -> io::Result<()> {
        cvt(unsafe { libc::sem_post(self.sem) })?;
        Ok(())
    }

    pub fn wait(&self) -> io::Result<()> {
        retry_interrupted(|| cvt(unsafe { libc::sem_wait(self.sem) }))?;
        Ok(())
    }

    /// Waits at most `timeout` for a permit. Returns `false` if none came.
    pub fn wait_timeout(&self, timeout: Duration) -> io::Result<bool> {
        let deadline = deadline_after(timeout)?;
        match retry_interrupted(|| cvt(unsafe { libc::sem_timedwait(self.sem, &deadline) })) {
            Ok(_) => Ok(true),
            Err(e) if e.raw_os_error() == Some(libc::ETIMEDOUT) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Removes the name from the system. Open handles, including those in
    /// forked children, keep working. Only the owning process unlinks.
    pub fn unlink(&self) {
        if getpid() != self.owner {
            return;
        }
        if let Ok(cname) = ipc_name(&self.name) {
            unsafe {
                libc::sem_unlink(cname.as_ptr());
            }
        }
    }
}

/// Absolute `CLOCK_REALTIME` deadline, as `sem_timedwait` expects.
fn deadline_after(timeout: Duration) -> io::Result<libc::timespec> {
    let mut now = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    cvt(unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) })?;

    let nanos = now.tv_nsec as u64 + u64::from(timeout.subsec_nanos());
    Ok(libc::timespec {
        tv_sec: now.tv_sec + timeout.as_secs() as libc::time_t + (nanos / 1_000_000_000) as libc::time_t,
        tv_nsec: (nanos % 1_000_000_000) as _,
    })
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem);
        }
        self.unlink();
    }
}

#[derive(Default)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self) {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        *permits += 1;
        self.available.notify_one();
    }

    pub fn wait(&self) {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        while *permits == 0 {
            permits = self
                .available
                .wait(permits)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *permits -= 1;
    }

    #[cfg(test)]
    fn try_wait(&self) -> bool {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn posts_queue_up() {
        let sem = Semaphore::new();
        sem.post();
        sem.post();
        assert!(sem.try_wait());
        assert!(sem.try_wait());
        assert!(!sem.try_wait());
    }

    #[test]
    fn wait_blocks_until_post() {
        let sem = Arc::new(Semaphore::new());
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.wait())
        };
        sem.post();
        waiter.join().unwrap();
        assert!(!sem.try_wait());
    }

    #[test]
    fn named_semaphore_counts() {
        let name = format!("staticd-test-sem-{}", std::process::id());
        let sem = NamedSemaphore::create(&name).unwrap();
        assert!(!sem.wait_timeout(Duration::ZERO).unwrap());
        sem.post().unwrap();
        sem.wait().unwrap();
        sem.post().unwrap();
        assert!(sem.wait_timeout(Duration::from_millis(50)).unwrap());
        assert!(!sem.wait_timeout(Duration::from_millis(20)).unwrap());
    }

    #[test]
    fn timed_wait_gives_up_after_timeout() {
        let name = format!("staticd-test-sem-timeout-{}", std::process::id());
        let sem = NamedSemaphore::create(&name).unwrap();

        let started = std::time::Instant::now();
        assert!(!sem.wait_timeout(Duration::from_millis(100)).unwrap());
        assert!(started.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn unlinked_name_is_gone_but_handle_works() {
        let name = format!("staticd-test-sem-unlink-{}", std::process::id());
        let sem = NamedSemaphore::create(&name).unwrap();
        sem.unlink();

        let cname = ipc_name(sem.name()).unwrap();
        let reopened = unsafe { libc::sem_open(cname.as_ptr(), 0) };
        assert_eq!(reopened, libc::SEM_FAILED);

        sem.post().unwrap();
        assert!(sem.wait_timeout(Duration::ZERO).unwrap());
    }
}
