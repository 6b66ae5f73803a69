//! Service health tracking.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use candela_types::HealthSink;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Overall service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// Aggregation and persistence are both healthy.
    Up,
    /// At least one of them is degraded.
    Down,
}

/// Freshness of the processed tick stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataStatus {
    /// A tick was processed recently.
    Active,
    /// No tick has been processed within the staleness window.
    Stale,
}

/// Point-in-time health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Up only if aggregation and persistence are healthy.
    pub status: HealthStatus,
    /// Whether aggregation is running without errors.
    pub aggregation_running: bool,
    /// Whether the last persistence attempt succeeded.
    pub persistence_healthy: bool,
    /// Wall-clock time of the last processed tick, in epoch milliseconds.
    pub last_candle_processed: Option<i64>,
    /// Milliseconds since the last processed tick.
    pub time_since_last_candle_ms: Option<i64>,
    /// Whether the tick stream is fresh.
    pub data_status: DataStatus,
}

/// Health state shared by the engine, scheduler and lifecycle.
#[derive(Debug)]
pub struct HealthMonitor {
    aggregation: AtomicBool,
    persistence: AtomicBool,
    last_processed_ms: AtomicI64,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self {
            aggregation: AtomicBool::new(true),
            persistence: AtomicBool::new(true),
            last_processed_ms: AtomicI64::new(Self::NEVER),
        }
    }
}

impl HealthMonitor {
    /// Data is stale once this many milliseconds pass without a tick.
    pub const STALE_AFTER_MS: i64 = 60_000;

    const NEVER: i64 = i64::MIN;

    /// Creates a monitor with both components healthy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if aggregation is healthy.
    #[must_use]
    pub fn aggregation_healthy(&self) -> bool {
        self.aggregation.load(Ordering::SeqCst)
    }

    /// Returns true if persistence is healthy.
    #[must_use]
    pub fn persistence_healthy(&self) -> bool {
        self.persistence.load(Ordering::SeqCst)
    }

    /// Returns the last processed time in epoch milliseconds.
    #[must_use]
    pub fn last_processed(&self) -> Option<i64> {
        let last = self.last_processed_ms.load(Ordering::SeqCst);
        (last != Self::NEVER).then_some(last)
    }

    /// Builds a report as seen at `now_ms`.
    #[must_use]
    pub fn report(&self, now_ms: i64) -> HealthReport {
        let aggregation_running = self.aggregation_healthy();
        let persistence_healthy = self.persistence_healthy();
        let last_candle_processed = self.last_processed();
        let time_since_last_candle_ms = last_candle_processed.map(|last| now_ms.saturating_sub(last));

        let data_status = match time_since_last_candle_ms {
            Some(elapsed) if elapsed <= Self::STALE_AFTER_MS => DataStatus::Active,
            _ => DataStatus::Stale,
        };
        let status = if aggregation_running && persistence_healthy {
            HealthStatus::Up
        } else {
            HealthStatus::Down
        };

        HealthReport {
            status,
            aggregation_running,
            persistence_healthy,
            last_candle_processed,
            time_since_last_candle_ms,
            data_status,
        }
    }

    /// Builds a report as seen now.
    #[must_use]
    pub fn report_now(&self) -> HealthReport {
        self.report(Utc::now().timestamp_millis())
    }
}

impl HealthSink for HealthMonitor {
    fn set_aggregation_healthy(&self, healthy: bool) {
        if self.aggregation.swap(healthy, Ordering::SeqCst) != healthy {
            tracing::info!(healthy, "Aggregation health changed");
        }
    }

    fn set_persistence_healthy(&self, healthy: bool) {
        if self.persistence.swap(healthy, Ordering::SeqCst) != healthy {
            tracing::info!(healthy, "Persistence health changed");
        }
    }

    fn notify_last_processed(&self, timestamp_ms: i64) {
        self.last_processed_ms.fetch_max(timestamp_ms, Ordering::SeqCst);
    }
}
