//! Shared runtime state injected into the engine, scheduler and lifecycle.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Process-wide "shutting down" flag.
///
/// Cloning yields a handle to the same flag. Once triggered it never resets.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Creates a signal in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the signal into the shutting-down state.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Returns true once [`trigger`](Self::trigger) has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when the signal is triggered.
    pub fn triggered(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Receiver of fire-and-forget health notifications.
pub trait HealthSink: Send + Sync + std::fmt::Debug {
    /// Records whether aggregation is running normally.
    fn set_aggregation_healthy(&self, healthy: bool);

    /// Records whether the last persistence attempt succeeded.
    fn set_persistence_healthy(&self, healthy: bool);

    /// Records that a tick was processed at `timestamp_ms` (wall clock).
    fn notify_last_processed(&self, timestamp_ms: i64);
}

/// Health sink that discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHealthSink;

impl HealthSink for NoopHealthSink {
    fn set_aggregation_healthy(&self, _healthy: bool) {}

    fn set_persistence_healthy(&self, _healthy: bool) {}

    fn notify_last_processed(&self, _timestamp_ms: i64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_is_shared_between_clones() {
        let signal = ShutdownSignal::new();
        let handle = signal.clone();
        assert!(!handle.is_shutting_down());

        signal.trigger();
        assert!(handle.is_shutting_down());
        signal.trigger();
        assert!(signal.is_shutting_down());
    }

    #[tokio::test]
    async fn test_triggered_resolves() {
        let signal = ShutdownSignal::new();
        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.triggered().await });
        signal.trigger();
        task.await.unwrap();
    }
}
