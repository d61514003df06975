use std::sync::Arc;
use std::time::Duration;

use staticd::config::Config;
use staticd::pool::{Pool, WorkerPool};
use staticd::server;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    tracing::info!(
        mode = ?cfg.server.mode,
        workers = cfg.server.workers,
        root = %cfg.static_files.root_dir.display(),
        "Starting staticd"
    );

    // Workers are forked before any runtime threads exist
    let mut pool = Pool::create(&cfg)?;
    pool.start()?;
    let pool = Arc::new(pool);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let served = runtime.block_on(async {
        tokio::select! {
            res = server::listener::run(&cfg.server, Arc::clone(&pool)) => res,

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
        }
    });
    runtime.shutdown_timeout(Duration::from_secs(5));

    // Unlinks every IPC name even while a handoff still holds the pool
    pool.stop()?;
    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.destroy()?,
        Err(_) => tracing::warn!("Handoff still in flight at shutdown, pool names already released"),
    }

    served
}
