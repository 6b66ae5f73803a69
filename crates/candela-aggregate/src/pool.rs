//! Bounded worker pool for per-interval aggregation tasks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;

/// Executes aggregation tasks with a cap on how many run at once.
///
/// Cloning yields a handle to the same pool. Tasks that are still waiting
/// for a permit, or still running, when the pool is force-cancelled resolve
/// to `None`.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    tracker: TaskTracker,
    cancel: CancellationToken,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CONCURRENCY)
    }
}

impl WorkerPool {
    /// Default number of tasks allowed to run concurrently.
    pub const DEFAULT_CONCURRENCY: usize = 10;

    /// Creates a pool running at most `max_concurrency` tasks at once.
    ///
    /// A value of zero is treated as one.
    #[must_use]
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    /// Returns the concurrency cap.
    #[must_use]
    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Returns the number of spawned tasks that have not finished.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Returns true once [`shutdown`](Self::shutdown) has started.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Returns true if outstanding tasks were force-cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Registers a unit of work that [`shutdown`](Self::shutdown) waits for
    /// until the returned token is dropped.
    ///
    /// Taking a token before checking for shutdown keeps the pool from
    /// draining between that check and the matching [`spawn`](Self::spawn).
    #[must_use]
    pub fn hold(&self) -> TaskTrackerToken {
        self.tracker.token()
    }

    /// Spawns `task` once a permit is available.
    ///
    /// The handle resolves to `None` if the pool was cancelled first.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                output = async move {
                    let _permit = permits.acquire_owned().await.ok()?;
                    Some(task.await)
                } => output,
            }
        })
    }

    /// Closes the pool and waits for outstanding tasks.
    ///
    /// Tasks get `grace` to finish on their own. Anything still running after
    /// that is cancelled. Returns true if every task finished within the
    /// grace period.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            tracing::debug!("Worker pool drained");
            return true;
        }

        tracing::warn!(
            in_flight = self.tracker.len(),
            grace_ms = grace.as_millis() as u64,
            "Worker pool did not finish within grace period, cancelling"
        );
        self.cancel.cancel();
        self.tracker.wait().await;
        false
    }
}
