//! Process-backed worker pool.
//!
//! Workers are forked children. A connection is handed over in four phases:
//!
//! ```text
//!   dispatcher                         worker
//!   ──────────                         ──────
//!                                      post idle
//!   wait idle   ◄──────────────────────┘
//!   post wake   ──────────────────────► wait wake, check run-flag
//!                                      bind rendezvous socket
//!   wait bound  ◄────────────────────── post bound
//!   connect + sendmsg(SCM_RIGHTS) ────► accept + recvmsg
//!   close client fd                    serve request, close everything
//! ```
//!
//! The semaphores are counting, so each `post wake` releases exactly one
//! worker. Handoffs are strictly serialized by the dispatcher.
//!
//! The dispatcher never blocks on a semaphore for good: it waits in short
//! slices and reaps dead workers in between, so a worker dying mid-handshake
//! turns into an error from `notify` instead of a stalled accept loop.

use anyhow::{Context, Result, bail};
use std::net::TcpStream;
use std::os::fd::OwnedFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::WorkerPool;
use super::fdpass::{recv_fd, send_fd};
use super::semaphore::NamedSemaphore;
use super::shm::SharedFlag;
use super::sys::getpid;
use crate::config::{ServerConfig, StaticFilesConfig};
use crate::http;

static POOL_SEQ: AtomicUsize = AtomicUsize::new(0);

/// How long one timed semaphore wait lasts before the workers are checked.
const HANDSHAKE_SLICE: Duration = Duration::from_millis(100);

/// Slices still granted to a bind once a worker death has been seen.
const BIND_GRACE_SLICES: u32 = 10;

/// Names of every OS object one pool instance owns.
#[derive(Debug, Clone)]
pub struct PoolNames {
    pub idle: String,
    pub wake: String,
    pub bound: String,
    pub run_flag: String,
    pub socket: PathBuf,
}

impl PoolNames {
    /// Derives names unique to this process and pool instance.
    pub fn for_this_run() -> Self {
        let tag = format!("staticd-{}-{}", getpid(), POOL_SEQ.fetch_add(1, Ordering::Relaxed));
        Self {
            idle: format!("{tag}-idle"),
            wake: format!("{tag}-wake"),
            bound: format!("{tag}-bound"),
            run_flag: format!("{tag}-run"),
            socket: std::env::temp_dir().join(format!("{tag}.sock")),
        }
    }
}

/// Removes the rendezvous socket file when the owning process lets go.
struct SocketPath {
    path: PathBuf,
    owner: libc::pid_t,
}

impl SocketPath {
    fn remove(&self) {
        if getpid() == self.owner {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl Drop for SocketPath {
    fn drop(&mut self) {
        self.remove();
    }
}

pub struct ProcessPool {
    server: ServerConfig,
    static_files: StaticFilesConfig,
    workers: usize,
    running: SharedFlag,
    idle: NamedSemaphore,
    wake: NamedSemaphore,
    bound: NamedSemaphore,
    socket: SocketPath,
    children: Mutex<Vec<libc::pid_t>>,
}

impl ProcessPool {
    pub fn create(server: &ServerConfig, static_files: &StaticFilesConfig) -> Result<Self> {
        Self::with_names(server, static_files, PoolNames::for_this_run())
    }

    pub fn with_names(
        server: &ServerConfig,
        static_files: &StaticFilesConfig,
        names: PoolNames,
    ) -> Result<Self> {
        let running = SharedFlag::create(&names.run_flag, false)
            .with_context(|| format!("Failed to create shared run-flag {}", names.run_flag))?;
        let idle = NamedSemaphore::create(&names.idle)
            .with_context(|| format!("Failed to create semaphore {}", names.idle))?;
        let wake = NamedSemaphore::create(&names.wake)
            .with_context(|| format!("Failed to create semaphore {}", names.wake))?;
        let bound = NamedSemaphore::create(&names.bound)
            .with_context(|| format!("Failed to create semaphore {}", names.bound))?;

        debug!(
            socket = %names.socket.display(),
            run_flag = running.name(),
            idle = idle.name(),
            wake = wake.name(),
            bound = bound.name(),
            "Process pool resources created"
        );

        Ok(Self {
            server: server.clone(),
            static_files: static_files.clone(),
            workers: server.workers,
            running,
            idle,
            wake,
            bound,
            socket: SocketPath {
                path: names.socket,
                owner: getpid(),
            },
            children: Mutex::new(Vec::new()),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket.path
    }

    pub fn is_running(&self) -> bool {
        self.running.load()
    }

    /// Pids of the workers that have not been reaped yet.
    pub fn worker_pids(&self) -> Vec<libc::pid_t> {
        self.children
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Body of a forked worker. Only returns on shutdown or a fatal error.
    fn worker_loop(&self, worker: usize) -> Result<()> {
        loop {
            self.idle.post().context("post idle")?;
            self.wake.wait().context("wait wake")?;

            if !self.running.load() {
                debug!(worker, "Run-flag cleared, worker exiting");
                return Ok(());
            }

            let path = self.socket_path();
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).context("remove stale rendezvous socket"),
            }
            let listener = UnixListener::bind(path)
                .with_context(|| format!("bind rendezvous socket {}", path.display()))?;
            self.bound.post().context("post bound")?;

            let (channel, _) = listener.accept().context("accept rendezvous connection")?;
            let client = recv_fd(&channel).context("receive client descriptor")?;
            debug!(worker, "Received client connection");

            if let Err(e) = http::handle_client(&self.server, &self.static_files, TcpStream::from(client)) {
                warn!(worker, error = %e, "Failed to serve client");
            }
            // listener, channel and the client stream all close here
        }
    }

    /// Takes one permit from `sem`, checking on the workers between slices.
    ///
    /// Fails once no worker is left. With `live_at_wake` set, also fails when
    /// a worker has died since the wake and the permit still has not come
    /// after the grace slices.
    fn await_permit(&self, sem: &NamedSemaphore, what: &str, live_at_wake: Option<usize>) -> Result<()> {
        let mut grace = BIND_GRACE_SLICES;
        loop {
            if sem
                .wait_timeout(HANDSHAKE_SLICE)
                .with_context(|| format!("wait for {what}"))?
            {
                return Ok(());
            }
            if !self.running.load() {
                bail!("process pool stopped while waiting for {what}");
            }

            let live = self.live_workers();
            if live == 0 {
                bail!("no live workers left while waiting for {what}");
            }
            if live_at_wake.is_some_and(|before| live < before) {
                if grace == 0 {
                    bail!("woken worker exited before {what}");
                }
                grace -= 1;
            }
        }
    }

    /// Unlinks the semaphores, the run-flag and the rendezvous socket.
    /// Handles still held elsewhere stay usable.
    fn release_names(&self) {
        self.idle.unlink();
        self.wake.unlink();
        self.bound.unlink();
        self.running.unlink();
        self.socket.remove();
    }

    fn reap(&self, pids: Vec<libc::pid_t>) {
        for pid in pids {
            let mut status = 0;
            let ret = unsafe { libc::waitpid(pid, &mut status, 0) };
            if ret == -1 {
                warn!(pid, error = %std::io::Error::last_os_error(), "Failed to reap worker");
            } else if libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0 {
                debug!(pid, "Worker exited");
            } else {
                warn!(pid, status, "Worker exited abnormally");
            }
        }
    }
}

impl WorkerPool for ProcessPool {
    fn start(&mut self) -> Result<()> {
        if self.running.swap(true) {
            bail!("process pool already started");
        }

        for worker in 0..self.workers {
            match unsafe { libc::fork() } {
                -1 => {
                    let err = std::io::Error::last_os_error();
                    self.stop()?;
                    return Err(err).context("fork worker process");
                }
                0 => {
                    let code = match self.worker_loop(worker) {
                        Ok(()) => 0,
                        Err(e) => {
                            error!(worker, pid = getpid(), error = ?e, "Worker failed");
                            1
                        }
                    };
                    unsafe { libc::_exit(code) }
                }
                pid => {
                    debug!(worker, pid, "Worker process started");
                    self.children
                        .get_mut()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .push(pid);
                }
            }
        }

        info!(workers = self.workers, "Process pool started");
        Ok(())
    }

    fn notify(&self, client: OwnedFd) -> Result<()> {
        if !self.running.load() {
            bail!("process pool is not running");
        }

        self.await_permit(&self.idle, "an idle worker", None)?;
        let live_at_wake = self.live_workers();
        self.wake.post().context("wake worker")?;
        self.await_permit(&self.bound, "the woken worker to bind", Some(live_at_wake))?;

        let channel = UnixStream::connect(self.socket_path())
            .with_context(|| format!("connect to {}", self.socket_path().display()))?;
        send_fd(&channel, client).context("send client descriptor")?;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if !self.running.swap(false) {
            self.release_names();
            return Ok(());
        }

        let pids = std::mem::take(
            &mut *self
                .children
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        let woken = (0..pids.len()).try_for_each(|_| self.wake.post());
        if woken.is_ok() {
            self.reap(pids);
        }
        self.release_names();
        woken.context("wake worker for shutdown")?;

        info!("Process pool stopped");
        Ok(())
    }

    fn live_workers(&self) -> usize {
        let mut children = self
            .children
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        children.retain(|&pid| {
            let mut status = 0;
            let ret = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
            if ret == pid {
                warn!(pid, status, "Worker process is gone, pool shrinks");
                false
            } else {
                true
            }
        });
        children.len()
    }
}

impl Drop for ProcessPool {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "Failed to stop process pool");
        }
    }
}
