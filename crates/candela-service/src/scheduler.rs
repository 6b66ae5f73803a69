//! Periodic flushing of active candles.

use std::sync::Arc;
use std::time::Duration;

use candela_aggregate::CandleStore;
use candela_store::{CandleRepository, CandleUpserter, PersistOutcome};
use candela_types::{CandelaError, Candle, HealthSink, ShutdownSignal};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::FailurePolicy;

/// Result of one flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Shutdown is in progress; the drain path owns the store.
    Skipped,
    /// There was nothing to flush.
    Idle,
    /// The snapshot was persisted.
    Persisted(PersistOutcome),
    /// The snapshot could not be persisted.
    Failed {
        /// Candles in the failed snapshot.
        candles: usize,
        /// Whether they were merged back into the store.
        requeued: bool,
    },
}

/// Moves active candles from the store to the repository on a fixed period.
#[derive(Debug)]
pub struct FlushScheduler<R> {
    store: Arc<CandleStore>,
    upserter: CandleUpserter<R>,
    shutdown: ShutdownSignal,
    health: Arc<dyn HealthSink>,
    policy: FailurePolicy,
    period: Duration,
    in_flight: Mutex<()>,
}

impl<R: CandleRepository + 'static> FlushScheduler<R> {
    /// Creates a scheduler flushing `store` every `period`.
    #[must_use]
    pub fn new(
        store: Arc<CandleStore>,
        upserter: CandleUpserter<R>,
        shutdown: ShutdownSignal,
        health: Arc<dyn HealthSink>,
        policy: FailurePolicy,
        period: Duration,
    ) -> Self {
        Self {
            store,
            upserter,
            shutdown,
            health,
            policy,
            period,
            in_flight: Mutex::new(()),
        }
    }

    /// Returns the flush period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Flushes the store once.
    ///
    /// Concurrent calls are serialized. Storage work runs on the blocking
    /// pool, so ingestion continues while a flush is in progress.
    pub async fn flush_once(&self) -> FlushOutcome {
        if self.shutdown.is_shutting_down() {
            tracing::debug!("Shutting down, skipping flush");
            return FlushOutcome::Skipped;
        }

        let _flushing = self.in_flight.lock().await;
        // Shutdown may have begun while waiting for a previous flush.
        if self.shutdown.is_shutting_down() {
            tracing::debug!("Shutting down, skipping queued flush");
            return FlushOutcome::Skipped;
        }
        let snapshot = self.store.take_snapshot();
        if snapshot.is_empty() {
            tracing::trace!("No active candles to flush");
            return FlushOutcome::Idle;
        }

        let candles = snapshot.len();
        let upserter = self.upserter.clone();
        let persisted = tokio::task::spawn_blocking(move || {
            let result = upserter.persist(&snapshot);
            (snapshot, result)
        })
        .await;

        match persisted {
            Ok((_, Ok(outcome))) => {
                self.health.set_persistence_healthy(true);
                tracing::info!(
                    candles,
                    updated = outcome.updated,
                    inserted = outcome.inserted,
                    "Flushed candles"
                );
                FlushOutcome::Persisted(outcome)
            }
            Ok((snapshot, Err(e))) => self.handle_failure(snapshot, &e),
            Err(e) => {
                self.health.set_persistence_healthy(false);
                tracing::error!(candles, error = %e, "Flush task aborted, snapshot lost");
                FlushOutcome::Failed {
                    candles,
                    requeued: false,
                }
            }
        }
    }

    fn handle_failure(&self, snapshot: Vec<Candle>, error: &CandelaError) -> FlushOutcome {
        self.health.set_persistence_healthy(false);
        let candles = snapshot.len();
        match self.policy {
            FailurePolicy::Drop => {
                tracing::error!(candles, error = %error, "Flush failed, dropping snapshot");
                FlushOutcome::Failed {
                    candles,
                    requeued: false,
                }
            }
            FailurePolicy::Requeue => {
                tracing::warn!(candles, error = %error, "Flush failed, requeueing snapshot");
                self.store.restore(snapshot);
                FlushOutcome::Failed {
                    candles,
                    requeued: true,
                }
            }
        }
    }

    /// Flushes every period until shutdown is signalled.
    ///
    /// A flush in progress when the signal fires runs to completion. Missed
    /// periods are delayed rather than replayed.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        tracing::debug!(period_ms = self.period.as_millis() as u64, "Flush scheduler started");
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.triggered() => break,
                _ = ticker.tick() => {
                    self.flush_once().await;
                }
            }
        }
        tracing::debug!("Flush scheduler stopped");
    }

    /// Runs [`run`](Self::run) on a new task.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run().await })
    }
}
