//! Wiring of the aggregation pipeline into one service.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use candela_aggregate::{AggregationEngine, CandleStore, IngestOutcome, WorkerPool};
use candela_store::{CandleRepository, CandleUpserter};
use candela_types::{HealthSink, ShutdownSignal, Tick};

use crate::{
    CandleHistory, ConfigError, DrainOutcome, FlushOutcome, FlushScheduler, HealthMonitor,
    HealthReport, LifecycleController, ServiceConfig, TickSimulator,
};

/// Tick-to-candle aggregation service over a candle repository.
///
/// Owns the candle store, the engine, the flush scheduler and the lifecycle
/// controller, all sharing one shutdown signal and one health monitor.
#[derive(Debug)]
pub struct CandleService<R> {
    config: ServiceConfig,
    store: Arc<CandleStore>,
    engine: AggregationEngine,
    scheduler: Arc<FlushScheduler<R>>,
    lifecycle: LifecycleController<R>,
    history: CandleHistory<R>,
    health: Arc<HealthMonitor>,
    shutdown: ShutdownSignal,
    started: AtomicBool,
}

impl<R: CandleRepository + 'static> CandleService<R> {
    /// Builds the service. Nothing runs until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(config: ServiceConfig, repository: Arc<R>) -> Result<Self, ConfigError> {
        config.validate()?;
        let engine_config = config.engine_config()?;

        let store = Arc::new(CandleStore::new());
        let shutdown = ShutdownSignal::new();
        let health = Arc::new(HealthMonitor::new());
        let sink: Arc<dyn HealthSink> = health.clone();
        let pool = WorkerPool::new(config.max_concurrent_intervals);
        let upserter = CandleUpserter::new(Arc::clone(&repository));

        let engine = AggregationEngine::new(
            engine_config,
            Arc::clone(&store),
            pool.clone(),
            shutdown.clone(),
            Arc::clone(&sink),
        );
        let scheduler = Arc::new(FlushScheduler::new(
            Arc::clone(&store),
            upserter.clone(),
            shutdown.clone(),
            Arc::clone(&sink),
            config.failure_policy,
            config.flush_rate(),
        ));
        let lifecycle = LifecycleController::new(
            Arc::clone(&store),
            upserter,
            pool,
            shutdown.clone(),
            sink,
            config.drain_timeout(),
            config.worker_grace(),
        );
        let history = CandleHistory::new(repository, config.symbols.clone());

        tracing::info!(
            intervals = ?engine.config().intervals,
            flush_rate_ms = config.flush_rate_ms,
            failure_policy = ?config.failure_policy,
            price_ordering = ?config.price_ordering,
            "Candle service configured"
        );

        Ok(Self {
            config,
            store,
            engine,
            scheduler,
            lifecycle,
            history,
            health,
            shutdown,
            started: AtomicBool::new(false),
        })
    }

    /// Starts the periodic flush loop. Must be called within a tokio runtime.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("Candle service already started");
            return;
        }
        self.lifecycle.attach_scheduler(self.scheduler.spawn());
        tracing::info!("Candle service started");
    }

    /// Aggregates one tick. See [`AggregationEngine::ingest`].
    ///
    /// # Errors
    ///
    /// Returns an error if the tick is invalid or no interval was updated.
    pub async fn ingest(&self, tick: Tick) -> candela_types::Result<IngestOutcome> {
        self.engine.ingest(tick).await
    }

    /// Runs one flush immediately.
    pub async fn flush_now(&self) -> FlushOutcome {
        self.scheduler.flush_once().await
    }

    /// Returns the current health report.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        self.health.report_now()
    }

    /// Returns the health monitor.
    #[must_use]
    pub const fn health_monitor(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    /// Returns the history reader.
    #[must_use]
    pub const fn history(&self) -> &CandleHistory<R> {
        &self.history
    }

    /// Returns the aggregation engine.
    #[must_use]
    pub const fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    /// Returns the active candle store.
    #[must_use]
    pub const fn store(&self) -> &Arc<CandleStore> {
        &self.store
    }

    /// Returns the configuration the service was built with.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Returns a handle to the shared shutdown signal.
    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Creates a tick simulator from the configured simulator settings.
    #[must_use]
    pub fn simulator(&self) -> TickSimulator {
        TickSimulator::new(self.config.simulator.clone())
    }

    /// Stops intake without draining. See
    /// [`LifecycleController::begin_shutdown`].
    pub fn begin_shutdown(&self) {
        self.lifecycle.begin_shutdown();
    }

    /// Runs the full shutdown sequence and returns the drain result.
    pub async fn shutdown(&self) -> DrainOutcome {
        self.lifecycle.shutdown().await
    }
}
