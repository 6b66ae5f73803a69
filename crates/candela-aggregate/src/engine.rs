//! Tick-to-candle aggregation across all configured intervals.

use std::sync::Arc;
use std::time::Duration;

use candela_types::{
    CandelaError, CandleKey, DEFAULT_LATE_TOLERANCE_PCT, HealthSink, Interval, Result,
    ShutdownSignal, Tick,
};
use chrono::Utc;

use crate::{Applied, CandleStore, PriceOrdering, WorkerPool};

/// Aggregation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Intervals every tick is aggregated into.
    pub intervals: Vec<Interval>,
    /// Divisor applied to `bid + ask` to derive the candle price.
    pub price_divisor: f64,
    /// Late-tick tolerance, in percent of the interval.
    pub late_tolerance_pct: u32,
    /// How `open` and `close` are chosen under concurrent arrival.
    pub ordering: PriceOrdering,
    /// Upper bound on how long one ingest waits for its interval tasks.
    pub event_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            intervals: vec![Interval::Second1, Interval::Minute1],
            price_divisor: 2.0,
            late_tolerance_pct: DEFAULT_LATE_TOLERANCE_PCT,
            ordering: PriceOrdering::Arrival,
            event_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Outcome of [`AggregationEngine::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The service is shutting down and the tick was ignored.
    Rejected,
    /// The tick was fanned out to every configured interval.
    Aggregated {
        /// Intervals whose candle was updated.
        applied: usize,
        /// Intervals that failed; each failure has been logged.
        failed: usize,
    },
}

/// Fans ticks out to one candle update per configured interval.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    config: Arc<EngineConfig>,
    store: Arc<CandleStore>,
    pool: WorkerPool,
    shutdown: ShutdownSignal,
    health: Arc<dyn HealthSink>,
}

impl AggregationEngine {
    /// Creates an engine writing into `store`.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        store: Arc<CandleStore>,
        pool: WorkerPool,
        shutdown: ShutdownSignal,
        health: Arc<dyn HealthSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            pool,
            shutdown,
            health,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the store candles are aggregated into.
    #[must_use]
    pub const fn store(&self) -> &Arc<CandleStore> {
        &self.store
    }

    /// Returns the pool interval tasks run on.
    #[must_use]
    pub const fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Aggregates `tick` into every configured interval.
    ///
    /// Returns once every interval task has finished or the event timeout
    /// has elapsed. A failure in one interval does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError::InvalidTick`] if the tick fails validation, or
    /// the first [`CandelaError::AggregationFailure`] if no interval could be
    /// updated.
    pub async fn ingest(&self, tick: Tick) -> Result<IngestOutcome> {
        // Held until every interval task has been joined, so a pool shutdown
        // that starts after the check below waits for this tick.
        let _admission = self.pool.hold();
        if self.shutdown.is_shutting_down() {
            tracing::debug!(symbol = %tick.symbol, "Shutting down, ignoring tick");
            return Ok(IngestOutcome::Rejected);
        }

        tick.validate()?;
        let price = tick.mid_with_divisor(self.config.price_divisor);
        tracing::trace!(
            symbol = %tick.symbol,
            bid = tick.bid,
            ask = tick.ask,
            timestamp = tick.timestamp,
            price,
            "Received tick"
        );

        let tick = Arc::new(tick);
        let deadline = tokio::time::Instant::now() + self.config.event_timeout;
        let tasks = self.config.intervals.iter().map(|&interval| {
            let store = Arc::clone(&self.store);
            let config = Arc::clone(&self.config);
            let tick = Arc::clone(&tick);
            let handle = self
                .pool
                .spawn(async move { aggregate_interval(&store, &config, &tick, interval, price) });
            tokio::time::timeout_at(deadline, handle)
        });
        let results = futures::future::join_all(tasks).await;

        let mut applied = 0;
        let mut failures = Vec::new();
        for (&interval, result) in self.config.intervals.iter().zip(results) {
            let outcome = match result {
                Ok(Ok(Some(outcome))) => outcome,
                Ok(Ok(None)) => Err(failure(interval, "worker pool cancelled")),
                Ok(Err(e)) => Err(failure(interval, e.to_string())),
                // The task keeps running and may still land its update.
                Err(_) => Err(failure(
                    interval,
                    format!("timed out after {:?}", self.config.event_timeout),
                )),
            };

            match outcome {
                Ok(_) => applied += 1,
                Err(e) => {
                    tracing::error!(
                        symbol = %tick.symbol,
                        %interval,
                        error = %e,
                        "Failed to aggregate tick"
                    );
                    failures.push(e);
                }
            }
        }

        if !failures.is_empty() {
            self.health.set_aggregation_healthy(false);
            if applied == 0 {
                return Err(failures.swap_remove(0));
            }
        }

        self.health.notify_last_processed(Utc::now().timestamp_millis());
        Ok(IngestOutcome::Aggregated {
            applied,
            failed: failures.len(),
        })
    }
}

fn failure(interval: Interval, reason: impl Into<String>) -> CandelaError {
    CandelaError::AggregationFailure {
        interval,
        reason: reason.into(),
    }
}

fn aggregate_interval(
    store: &CandleStore,
    config: &EngineConfig,
    tick: &Tick,
    interval: Interval,
    price: f64,
) -> Result<Applied> {
    let open_time = interval
        .align_with_tolerance(tick.timestamp, config.late_tolerance_pct)
        .ok_or_else(|| {
            failure(
                interval,
                format!("bucket for timestamp {} is out of range", tick.timestamp),
            )
        })?;

    let key = CandleKey::new(tick.symbol.as_str(), interval, open_time);
    let applied = store.apply(key, price, tick.timestamp, config.ordering);
    match applied {
        Applied::Created => tracing::debug!(
            symbol = %tick.symbol,
            %interval,
            open_time,
            price,
            "Created candle"
        ),
        Applied::Merged => tracing::trace!(
            symbol = %tick.symbol,
            %interval,
            open_time,
            price,
            "Updated candle"
        ),
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

    #[derive(Debug)]
    struct RecordingSink {
        aggregation_healthy: AtomicBool,
        last_processed: AtomicI64,
        calls: Mutex<Vec<&'static str>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                aggregation_healthy: AtomicBool::new(true),
                last_processed: AtomicI64::new(0),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl HealthSink for RecordingSink {
        fn set_aggregation_healthy(&self, healthy: bool) {
            self.aggregation_healthy.store(healthy, Ordering::SeqCst);
            self.calls.lock().unwrap().push("aggregation");
        }

        fn set_persistence_healthy(&self, _healthy: bool) {
            self.calls.lock().unwrap().push("persistence");
        }

        fn notify_last_processed(&self, timestamp_ms: i64) {
            self.last_processed.store(timestamp_ms, Ordering::SeqCst);
        }
    }

    fn engine_with(config: EngineConfig) -> (AggregationEngine, ShutdownSignal, Arc<RecordingSink>) {
        let shutdown = ShutdownSignal::new();
        let sink = RecordingSink::new();
        let engine = AggregationEngine::new(
            config,
            Arc::new(CandleStore::new()),
            WorkerPool::default(),
            shutdown.clone(),
            sink.clone(),
        );
        (engine, shutdown, sink)
    }

    fn config(intervals: Vec<Interval>) -> EngineConfig {
        EngineConfig {
            intervals,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_ticks_build_one_second_candle() {
        let (engine, _, sink) = engine_with(config(vec![Interval::Second1]));

        let outcome = engine
            .ingest(Tick::new("BTC-USD", 30000.0, 30100.0, 1000))
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Aggregated { applied: 1, failed: 0 });
        engine
            .ingest(Tick::new("BTC-USD", 30200.0, 30300.0, 1000))
            .await
            .unwrap();

        let candle = engine
            .store()
            .get(&CandleKey::new("BTC-USD", Interval::Second1, 1000))
            .unwrap();
        assert_relative_eq!(candle.open, 30050.0);
        assert_relative_eq!(candle.high, 30250.0);
        assert_relative_eq!(candle.low, 30050.0);
        assert_relative_eq!(candle.close, 30250.0);
        assert_eq!(candle.volume, 2);
        assert!(sink.last_processed.load(Ordering::SeqCst) > 0);
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tick_fans_out_to_every_interval() {
        let (engine, _, _) = engine_with(EngineConfig::default());

        engine
            .ingest(Tick::new("ETH-USD", 2000.0, 2002.0, 1000))
            .await
            .unwrap();

        let mut candles = engine.store().candles();
        candles.sort_by_key(|c| c.interval);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].key(), CandleKey::new("ETH-USD", Interval::Second1, 1000));
        // 1000 is 40s into the 960 minute, past the 6s tolerance.
        assert_eq!(candles[1].key(), CandleKey::new("ETH-USD", Interval::Minute1, 1020));
    }

    #[tokio::test]
    async fn test_price_divisor_is_applied() {
        let (engine, _, _) = engine_with(EngineConfig {
            intervals: vec![Interval::Second1],
            price_divisor: 4.0,
            ..EngineConfig::default()
        });

        engine.ingest(Tick::new("X", 10.0, 30.0, 5)).await.unwrap();
        let candle = engine
            .store()
            .get(&CandleKey::new("X", Interval::Second1, 5))
            .unwrap();
        assert_relative_eq!(candle.open, 10.0);
    }

    #[tokio::test]
    async fn test_invalid_tick_is_rejected() {
        let (engine, _, sink) = engine_with(EngineConfig::default());

        let err = engine
            .ingest(Tick::new("BTC-USD", 30100.0, 30000.0, 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, CandelaError::InvalidTick(_)));
        assert!(engine.store().is_empty());
        assert_eq!(sink.last_processed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ingest_after_shutdown_is_a_no_op() {
        let (engine, shutdown, _) = engine_with(EngineConfig::default());
        shutdown.trigger();

        let outcome = engine
            .ingest(Tick::new("BTC-USD", 1.0, 2.0, 1000))
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Rejected);
        assert!(engine.store().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported() {
        let (engine, _, sink) = engine_with(config(vec![Interval::Second1, Interval::Day1]));

        let outcome = engine
            .ingest(Tick::new("BTC-USD", 1.0, 2.0, i64::MAX))
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Aggregated { applied: 1, failed: 1 });
        assert_eq!(engine.store().len(), 1);
        assert!(!sink.aggregation_healthy.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_total_failure_is_an_error() {
        let (engine, _, sink) = engine_with(config(vec![Interval::Hour4, Interval::Day1]));

        let err = engine
            .ingest(Tick::new("BTC-USD", 1.0, 2.0, i64::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, CandelaError::AggregationFailure { .. }));
        assert!(engine.store().is_empty());
        assert!(!sink.aggregation_healthy.load(Ordering::SeqCst));
        assert_eq!(sink.last_processed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_event_time_ordering() {
        let (engine, _, _) = engine_with(EngineConfig {
            intervals: vec![Interval::Minute1],
            ordering: PriceOrdering::EventTime,
            ..EngineConfig::default()
        });

        for (price, ts) in [(100.0, 965), (90.0, 961), (95.0, 963)] {
            engine
                .ingest(Tick::new("SOL-USD", price, price, ts))
                .await
                .unwrap();
        }

        let candle = engine
            .store()
            .get(&CandleKey::new("SOL-USD", Interval::Minute1, 960))
            .unwrap();
        assert_relative_eq!(candle.open, 90.0);
        assert_relative_eq!(candle.close, 100.0);
        assert_eq!(candle.volume, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ingest_loses_no_ticks() {
        let (engine, _, _) = engine_with(EngineConfig::default());
        let producers = 8;
        let per_producer = 250;

        let tasks: Vec<_> = (0..producers)
            .map(|p| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    for i in 0..per_producer {
                        let price = f64::from(p * per_producer + i);
                        engine
                            .ingest(Tick::new("BTC-USD", price, price, 1000))
                            .await
                            .unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let candle = engine
            .store()
            .get(&CandleKey::new("BTC-USD", Interval::Second1, 1000))
            .unwrap();
        assert_eq!(candle.volume, i64::from(producers * per_producer));
        assert_relative_eq!(candle.low, 0.0);
        assert_relative_eq!(candle.high, f64::from(producers * per_producer - 1));
    }
}
