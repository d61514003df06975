//! Thread-backed worker pool.
//!
//! Same contract and the same idle / wake / bound handshake as the process
//! backend, with in-memory semaphores and a zero-capacity channel standing in
//! for the rendezvous socket.

use anyhow::{Context, Result, anyhow, bail};
use std::net::TcpStream;
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use super::WorkerPool;
use super::semaphore::Semaphore;
use crate::config::{ServerConfig, StaticFilesConfig};
use crate::http;

struct Shared {
    running: AtomicBool,
    idle: Semaphore,
    wake: Semaphore,
    bound: Semaphore,
    /// Only the one woken worker ever contends for this lock
    handoff: Mutex<Receiver<OwnedFd>>,
    server: ServerConfig,
    static_files: StaticFilesConfig,
}

pub struct ThreadPool {
    shared: Arc<Shared>,
    handoff: SyncSender<OwnedFd>,
    workers: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    pub fn create(server: &ServerConfig, static_files: &StaticFilesConfig) -> Result<Self> {
        let (tx, rx) = sync_channel(0);
        Ok(Self {
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                idle: Semaphore::new(),
                wake: Semaphore::new(),
                bound: Semaphore::new(),
                handoff: Mutex::new(rx),
                server: server.clone(),
                static_files: static_files.clone(),
            }),
            handoff: tx,
            workers: server.workers,
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}

fn worker_loop(shared: &Shared, worker: usize) -> Result<()> {
    loop {
        shared.idle.post();
        shared.wake.wait();

        if !shared.running.load(Ordering::Acquire) {
            debug!(worker, "Run-flag cleared, worker exiting");
            return Ok(());
        }

        shared.bound.post();
        let client = shared
            .handoff
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv()
            .map_err(|_| anyhow!("dispatcher hung up"))?;
        debug!(worker, "Received client connection");

        if let Err(e) = http::handle_client(&shared.server, &shared.static_files, TcpStream::from(client)) {
            warn!(worker, error = %e, "Failed to serve client");
        }
    }
}

impl WorkerPool for ThreadPool {
    fn start(&mut self) -> Result<()> {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            bail!("thread pool already started");
        }

        let handles = self.handles.get_mut().unwrap_or_else(PoisonError::into_inner);
        for worker in 0..self.workers {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("staticd-worker-{worker}"))
                .spawn(move || {
                    if let Err(e) = worker_loop(&shared, worker) {
                        error!(worker, error = ?e, "Worker failed");
                    }
                })
                .context("spawn worker thread")?;
            handles.push(handle);
        }

        info!(workers = self.workers, "Thread pool started");
        Ok(())
    }

    fn notify(&self, client: OwnedFd) -> Result<()> {
        if !self.is_running() {
            bail!("thread pool is not running");
        }

        self.shared.idle.wait();
        self.shared.wake.post();
        self.shared.bound.wait();

        self.handoff
            .send(client)
            .map_err(|_| anyhow!("worker went away during handoff"))?;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for _ in 0..handles.len() {
            self.shared.wake.post();
        }
        for handle in handles {
            if handle.join().is_err() {
                warn!("Worker thread panicked");
            }
        }

        info!("Thread pool stopped");
        Ok(())
    }

    fn live_workers(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "Failed to stop thread pool");
        }
    }
}
