//! Bounded worker pool with caller-runs backpressure
//!
//! Items are queued on a bounded channel and picked up by a fixed number of
//! worker tasks. When the queue is full, `submit` runs the item on the
//! caller instead of waiting for space, which slows the paginating producer
//! down to the pool's pace. Every item runs behind `catch_unwind`, so a panic
//! in one item never takes down a worker or its siblings.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

type Task = BoxFuture<'static, ()>;

/// How a pool shut down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers still running when the grace period ran out
    pub aborted: usize,
    /// Items the submitter ran itself because the queue was full
    pub inline_runs: u64,
    /// Items that panicked
    pub panicked: u64,
}

impl ShutdownReport {
    pub fn timed_out(&self) -> bool {
        self.aborted > 0
    }
}

/// Fixed-size pool of async workers
pub struct WorkerPool {
    sender: mpsc::Sender<Task>,
    workers: JoinSet<()>,
    inline_runs: Arc<AtomicU64>,
    panicked: Arc<AtomicU64>,
}

impl WorkerPool {
    /// Spawns `workers` workers sharing a queue of `queue_capacity` items
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Task>(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let panicked = Arc::new(AtomicU64::new(0));

        let mut set = JoinSet::new();
        for worker in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            let panicked = Arc::clone(&panicked);
            set.spawn(async move {
                loop {
                    let task = receiver.lock().await.recv().await;
                    let Some(task) = task else {
                        break;
                    };
                    run_isolated(task, &panicked).await;
                }
                tracing::trace!(worker = worker, "Worker finished");
            });
        }

        tracing::debug!(
            workers = workers.max(1),
            queue_capacity = queue_capacity.max(1),
            "Started worker pool"
        );

        Self {
            sender,
            workers: set,
            inline_runs: Arc::new(AtomicU64::new(0)),
            panicked,
        }
    }

    /// Hands an item to the pool, or runs it here if the queue is full
    ///
    /// Returns once the item is queued or, for a caller-run item, finished.
    pub async fn submit<F>(&self, item: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = match self.sender.try_send(Box::pin(item)) {
            Ok(()) => return,
            Err(TrySendError::Full(task)) | Err(TrySendError::Closed(task)) => task,
        };

        self.inline_runs.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("Worker queue full, running item on submitter");
        run_isolated(task, &self.panicked).await;
    }

    pub fn inline_runs(&self) -> u64 {
        self.inline_runs.load(Ordering::Relaxed)
    }

    /// Stops accepting items and waits for queued ones to drain
    ///
    /// Workers still busy after `grace` are aborted, dropping whatever is
    /// left in the queue.
    pub async fn shutdown(self, grace: Duration) -> ShutdownReport {
        let WorkerPool {
            sender,
            mut workers,
            inline_runs,
            panicked,
        } = self;
        drop(sender);

        let drained = tokio::time::timeout(grace, async {
            while workers.join_next().await.is_some() {}
        })
        .await;

        let mut aborted = 0;
        if drained.is_err() {
            aborted = workers.len();
            tracing::warn!(
                aborted = aborted,
                grace_secs = grace.as_secs_f64(),
                "Worker pool did not drain within grace period, aborting"
            );
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }

        ShutdownReport {
            aborted,
            inline_runs: inline_runs.load(Ordering::Relaxed),
            panicked: panicked.load(Ordering::Relaxed),
        }
    }
}

async fn run_isolated(task: Task, panicked: &AtomicU64) {
    if AssertUnwindSafe(task).catch_unwind().await.is_err() {
        panicked.fetch_add(1, Ordering::Relaxed);
        tracing::error!("Crawl item panicked; continuing with remaining items");
    }
}
