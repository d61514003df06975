use std::os::fd::OwnedFd;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::pool::{Pool, WorkerPool};

/// Accepts connections and hands each one to the pool.
///
/// Each handoff is awaited before the next accept, so the pool never sees
/// overlapping `notify` calls.
pub async fn run(cfg: &ServerConfig, pool: Arc<Pool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(cfg.listen_addr()).await?;
    info!("Listening on {}", cfg.listen_addr());

    loop {
        let (socket, peer) = listener.accept().await?;
        info!("Accepted connection from {}", peer);

        // Workers do blocking I/O on the descriptor
        let socket = socket.into_std()?;
        socket.set_nonblocking(false)?;
        let client = OwnedFd::from(socket);

        let dispatcher = Arc::clone(&pool);
        match tokio::task::spawn_blocking(move || dispatcher.notify(client)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Handoff for {} failed: {:#}", peer, e);
                if pool.live_workers() == 0 {
                    anyhow::bail!("no live workers left");
                }
            }
            Err(e) => warn!("Handoff task for {} aborted: {}", peer, e),
        }
    }
}
