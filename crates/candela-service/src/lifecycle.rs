//! Graceful shutdown: stop intake, quiesce workers, drain the store.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use candela_aggregate::{CandleStore, WorkerPool};
use candela_store::{CandleRepository, CandleUpserter, PersistOutcome};
use candela_types::{HealthSink, ShutdownSignal};
use tokio::task::JoinHandle;

/// Result of the final drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The store held no candles.
    Empty,
    /// Every remaining candle was persisted.
    Persisted(PersistOutcome),
    /// Persisting the remaining candles failed.
    Failed {
        /// Candles that could not be persisted.
        candles: usize,
    },
    /// Persistence did not finish within the drain timeout.
    ///
    /// The write keeps running on the blocking pool and may still commit.
    TimedOut {
        /// Candles in the pending write.
        candles: usize,
    },
}

/// Coordinates shutdown of the aggregation pipeline.
#[derive(Debug)]
pub struct LifecycleController<R> {
    store: Arc<CandleStore>,
    upserter: CandleUpserter<R>,
    pool: WorkerPool,
    shutdown: ShutdownSignal,
    health: Arc<dyn HealthSink>,
    drain_timeout: Duration,
    worker_grace: Duration,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl<R: CandleRepository + 'static> LifecycleController<R> {
    /// Creates a controller for the given pipeline parts.
    #[must_use]
    pub fn new(
        store: Arc<CandleStore>,
        upserter: CandleUpserter<R>,
        pool: WorkerPool,
        shutdown: ShutdownSignal,
        health: Arc<dyn HealthSink>,
        drain_timeout: Duration,
        worker_grace: Duration,
    ) -> Self {
        Self {
            store,
            upserter,
            pool,
            shutdown,
            health,
            drain_timeout,
            worker_grace,
            scheduler: Mutex::new(None),
        }
    }

    /// Registers the running flush loop so [`shutdown`](Self::shutdown) can
    /// wait for it. Replaces any previously registered handle.
    pub fn attach_scheduler(&self, handle: JoinHandle<()>) {
        let previous = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Returns true once shutdown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_shutting_down()
    }

    /// Stops intake: further ingests are ignored and further scheduled
    /// flushes are skipped.
    pub fn begin_shutdown(&self) {
        if self.shutdown.is_shutting_down() {
            tracing::debug!("Shutdown already in progress");
            return;
        }
        self.shutdown.trigger();
        self.health.set_aggregation_healthy(false);
        tracing::info!("Shutdown initiated, no longer accepting ticks");
    }

    /// Persists whatever remains in the store, waiting up to `timeout`.
    ///
    /// Failures and timeouts are logged and degrade persistence health; the
    /// call itself always completes.
    pub async fn drain_and_wait(&self, timeout: Duration) -> DrainOutcome {
        let snapshot = self.store.take_snapshot();
        if snapshot.is_empty() {
            tracing::info!("No active candles to drain");
            return DrainOutcome::Empty;
        }

        let candles = snapshot.len();
        tracing::info!(candles, timeout_ms = timeout.as_millis() as u64, "Draining active candles");
        let upserter = self.upserter.clone();
        let write = tokio::task::spawn_blocking(move || upserter.persist(&snapshot));

        match tokio::time::timeout(timeout, write).await {
            Ok(Ok(Ok(outcome))) => {
                self.health.set_persistence_healthy(true);
                tracing::info!(
                    candles,
                    updated = outcome.updated,
                    inserted = outcome.inserted,
                    "Drained active candles"
                );
                DrainOutcome::Persisted(outcome)
            }
            Ok(Ok(Err(e))) => {
                self.health.set_persistence_healthy(false);
                tracing::error!(candles, error = %e, "Failed to drain active candles");
                DrainOutcome::Failed { candles }
            }
            Ok(Err(e)) => {
                self.health.set_persistence_healthy(false);
                tracing::error!(candles, error = %e, "Drain task aborted");
                DrainOutcome::Failed { candles }
            }
            Err(_) => {
                self.health.set_persistence_healthy(false);
                tracing::warn!(
                    candles,
                    timeout_ms = timeout.as_millis() as u64,
                    "Drain timed out, write continues in background"
                );
                DrainOutcome::TimedOut { candles }
            }
        }
    }

    /// Runs the full shutdown sequence.
    ///
    /// Begins shutdown, waits for the flush loop to stop, gives in-flight
    /// aggregation tasks the worker grace period, then drains the store so
    /// that every merge that was in flight is included.
    pub async fn shutdown(&self) -> DrainOutcome {
        self.begin_shutdown();

        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(scheduler) = scheduler {
            if let Err(e) = scheduler.await {
                tracing::warn!(error = %e, "Flush scheduler ended abnormally");
            }
        }

        if !self.pool.shutdown(self.worker_grace).await {
            self.health.set_aggregation_healthy(false);
        }

        self.drain_and_wait(self.drain_timeout).await
    }
}
