//! Worker loop.
//!
//! The document hub enqueues a [`WorkerTask`] whenever a document changes. For each task
//! the worker reads the merged document, hands the state to the update callback and then
//! applies the compaction policy. Tasks run concurrently and independently; a failure in
//! one is logged and never affects another.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use ystore_core::compaction::{self, CompactionOutcome, CompactionPolicy, FragmentThreshold, Never};
use ystore_core::storage::{DocumentStorage, StorageError};
use ystore_shared::config::WorkerConfig;

use crate::delivery::UpdateCallback;

/// One changed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerTask {
    /// Room namespace.
    pub room: String,
    /// Document name within the room.
    pub docname: String,
}

impl WorkerTask {
    /// Create a task.
    #[must_use]
    pub fn new(room: impl Into<String>, docname: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            docname: docname.into(),
        }
    }

    /// Parse a `room<TAB>docname` line. Blank lines yield `None`.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (room, docname) = line.split_once('\t')?;
        if room.is_empty() || docname.is_empty() {
            return None;
        }
        Some(Self::new(room, docname))
    }
}

/// Bounded task queue feeding a [`Worker`].
#[must_use]
pub fn task_queue(capacity: usize) -> (mpsc::Sender<WorkerTask>, mpsc::Receiver<WorkerTask>) {
    mpsc::channel(capacity.max(1))
}

/// Compaction policy for the configured threshold. `0` means never.
#[must_use]
pub fn compaction_policy(config: &WorkerConfig) -> Arc<dyn CompactionPolicy> {
    match config.compaction_threshold {
        0 => Arc::new(Never),
        n => Arc::new(FragmentThreshold::new(n)),
    }
}

/// Consumes [`WorkerTask`]s until the queue closes or shutdown is requested.
pub struct Worker<S> {
    storage: Arc<S>,
    callback: UpdateCallback,
    policy: Arc<dyn CompactionPolicy>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl<S> Worker<S>
where
    S: DocumentStorage + 'static,
{
    /// Create a worker.
    #[must_use]
    pub fn new(
        storage: Arc<S>,
        callback: UpdateCallback,
        policy: Arc<dyn CompactionPolicy>,
    ) -> Self {
        Self {
            storage,
            callback,
            policy,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the loop when cancelled. In-flight deliveries are aborted;
    /// storage work already started runs to completion.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until `tasks` closes or the shutdown token fires, then wait for in-flight
    /// tasks.
    pub async fn run(self, mut tasks: mpsc::Receiver<WorkerTask>) {
        info!(delivery = self.callback.is_enabled(), "worker started");
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    info!("worker shutting down");
                    break;
                }
                task = tasks.recv() => match task {
                    Some(task) => self.spawn(task),
                    None => {
                        debug!("task queue closed");
                        break;
                    }
                },
            }
        }

        self.tracker.close();
        self.tracker.wait().await;
        info!("worker stopped");
    }

    fn spawn(&self, task: WorkerTask) {
        let storage = Arc::clone(&self.storage);
        let callback = self.callback.clone();
        let policy = Arc::clone(&self.policy);
        let tracker = self.tracker.clone();
        let cancel = self.shutdown.child_token();

        self.tracker.spawn(async move {
            let WorkerTask { room, docname } = task;
            if let Err(err) = process(
                storage.as_ref(),
                &callback,
                policy.as_ref(),
                &tracker,
                cancel,
                &room,
                &docname,
            )
            .await
            {
                error!(room = %room, docname = %docname, error = %err, "worker task failed");
            }
        });
    }
}

async fn process<S>(
    storage: &S,
    callback: &UpdateCallback,
    policy: &dyn CompactionPolicy,
    tracker: &TaskTracker,
    cancel: CancellationToken,
    room: &str,
    docname: &str,
) -> Result<(), StorageError>
where
    S: DocumentStorage,
{
    let Some(doc) = storage.retrieve_doc(room, docname).await? else {
        warn!(room, docname, "no fragments for updated document");
        return Ok(());
    };

    callback.dispatch(tracker, room.to_string(), doc.state.clone(), cancel);

    if let CompactionOutcome::Compacted { removed } =
        compaction::compact(storage, room, docname, &doc, policy).await?
    {
        debug!(room, docname, removed, "worker compacted document");
    }
    Ok(())
}
