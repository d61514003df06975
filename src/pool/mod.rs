//! Fixed-size worker pools.
//!
//! Both backends implement `WorkerPool`, so the accept loop never needs to
//! know which one it drives. The backend is picked once from `Mode` when the
//! pool is created.
//!
//! A worker that hits a fatal error exits and is not replaced; the pool keeps
//! serving with the workers it has left. `WorkerPool::live_workers` reports
//! how many remain.

pub mod fdpass;
pub mod process;
pub mod semaphore;
pub mod shm;
pub mod sys;
pub mod thread;

use anyhow::Result;
use std::os::fd::OwnedFd;

use crate::config::{Config, Mode};

pub use process::ProcessPool;
pub use thread::ThreadPool;

/// The contract every pool backend fulfils.
pub trait WorkerPool: Send + Sync {
    /// Spawns the workers.
    fn start(&mut self) -> Result<()>;

    /// Hands one accepted connection to an idle worker.
    ///
    /// Blocks until the worker owns the descriptor. Callers must not overlap
    /// calls; one handoff is in flight at a time.
    fn notify(&self, client: OwnedFd) -> Result<()>;

    /// Tells every worker to exit once it next wakes, then waits for them.
    /// Requests already being served run to completion.
    fn stop(&self) -> Result<()>;

    /// Number of workers still alive.
    fn live_workers(&self) -> usize;
}

pub enum Pool {
    Process(ProcessPool),
    Thread(ThreadPool),
}

impl Pool {
    pub fn create(cfg: &Config) -> Result<Self> {
        Ok(match cfg.server.mode {
            Mode::Process => Pool::Process(ProcessPool::create(&cfg.server, &cfg.static_files)?),
            Mode::Thread => Pool::Thread(ThreadPool::create(&cfg.server, &cfg.static_files)?),
        })
    }

    pub fn mode(&self) -> Mode {
        match self {
            Pool::Process(_) => Mode::Process,
            Pool::Thread(_) => Mode::Thread,
        }
    }

    /// Stops the pool if needed and releases everything it owns.
    pub fn destroy(self) -> Result<()> {
        self.stop()?;
        drop(self);
        Ok(())
    }

    fn backend(&self) -> &dyn WorkerPool {
        match self {
            Pool::Process(p) => p as &dyn WorkerPool,
            Pool::Thread(p) => p as &dyn WorkerPool,
        }
    }
}

impl WorkerPool for Pool {
    fn start(&mut self) -> Result<()> {
        match self {
            Pool::Process(p) => p.start(),
            Pool::Thread(p) => p.start(),
        }
    }

    fn notify(&self, client: OwnedFd) -> Result<()> {
        self.backend().notify(client)
    }

    fn stop(&self) -> Result<()> {
        self.backend().stop()
    }

    fn live_workers(&self) -> usize {
        self.backend().live_workers()
    }
}
