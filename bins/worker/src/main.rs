//! ystore update worker
//!
//! Reads `room<TAB>docname` lines from stdin, one per changed document, and for each
//! one delivers the merged state to the configured callback and applies compaction.
//! Exits when stdin closes or on Ctrl-C, after in-flight tasks finish.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ystore_core::DocumentStorage;
use ystore_runtime::{UpdateCallback, Worker, WorkerTask, compaction_policy, open_storage, task_queue};
use ystore_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ystore=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::load()?;

    let storage = Arc::new(open_storage(&config).await?);
    info!(backend = storage.name(), "storage ready");

    let callback = UpdateCallback::from_config(&config.callback)?;
    if !callback.is_enabled() {
        info!("no update callback configured, deliveries are skipped");
    }

    let (tx, rx) = task_queue(config.worker.queue_capacity);
    let worker = Worker::new(
        Arc::clone(&storage),
        callback,
        compaction_policy(&config.worker),
    );
    let shutdown = worker.shutdown_token();
    let running = tokio::spawn(worker.run(rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl-C");
                shutdown.cancel();
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) => match WorkerTask::parse_line(&line) {
                    Some(task) => {
                        if tx.send(task).await.is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!(%line, "ignoring malformed task line"),
                },
                None => break,
            },
        }
    }
    drop(tx);

    running.await?;
    storage.destroy().await?;
    info!("worker exited");
    Ok(())
}
