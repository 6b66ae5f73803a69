//! Benchmark utilities for candela.

use candela_lib::{
    AggregationEngine, CandleStore, CandleUpserter, EngineConfig, Interval, NoopHealthSink,
    ShutdownSignal, SqliteCandleRepository, Tick, WorkerPool,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shape of a synthetic tick stream.
#[derive(Debug, Clone)]
pub struct Workload {
    /// Number of distinct symbols.
    pub symbols: usize,
    /// Number of ticks to generate.
    pub ticks: usize,
    /// Seconds covered by the stream, starting at `start`.
    pub span_secs: i64,
    /// Epoch second of the first tick.
    pub start: i64,
    /// RNG seed.
    pub seed: u64,
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            symbols: 8,
            ticks: 10_000,
            span_secs: 600,
            start: 1_700_000_000,
            seed: 42,
        }
    }
}

impl Workload {
    /// Generates the tick stream, timestamps non-decreasing.
    pub fn ticks(&self) -> Vec<Tick> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let symbols: Vec<String> = (0..self.symbols.max(1)).map(|i| format!("SYM{i}-USD")).collect();
        let step = self.span_secs as f64 / self.ticks.max(1) as f64;

        (0..self.ticks)
            .map(|i| {
                let symbol = symbols[rng.gen_range(0..symbols.len())].clone();
                let mid = 100.0 + rng.gen_range(0.0..10.0);
                let timestamp = self.start + (i as f64 * step) as i64;
                Tick::new(symbol, mid - 0.5, mid + 0.5, timestamp)
            })
            .collect()
    }
}

/// Builds an engine over a fresh store with no health reporting.
pub fn engine(intervals: Vec<Interval>, concurrency: usize) -> (AggregationEngine, Arc<CandleStore>) {
    let store = Arc::new(CandleStore::new());
    let engine = AggregationEngine::new(
        EngineConfig {
            intervals,
            ..EngineConfig::default()
        },
        Arc::clone(&store),
        WorkerPool::new(concurrency),
        ShutdownSignal::new(),
        Arc::new(NoopHealthSink),
    );
    (engine, store)
}

/// Result of one timed pipeline run.
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    /// Ticks fed to the engine.
    pub ticks: usize,
    /// Active candles after ingest.
    pub candles: usize,
    /// Time spent ingesting.
    pub ingest: Duration,
    /// Time spent persisting the snapshot.
    pub persist: Duration,
}

impl BenchmarkResult {
    /// Ticks ingested per second.
    pub fn ticks_per_sec(&self) -> f64 {
        let secs = self.ingest.as_secs_f64();
        if secs > 0.0 { self.ticks as f64 / secs } else { 0.0 }
    }

    /// Candles persisted per second.
    pub fn candles_per_sec(&self) -> f64 {
        let secs = self.persist.as_secs_f64();
        if secs > 0.0 { self.candles as f64 / secs } else { 0.0 }
    }
}

/// Ingests `ticks` into a fresh engine, then persists the snapshot to
/// SQLite at `database`.
pub async fn run_pipeline(
    ticks: Vec<Tick>,
    intervals: Vec<Interval>,
    concurrency: usize,
    database: &Path,
) -> Result<BenchmarkResult, Box<dyn std::error::Error + Send + Sync>> {
    let (engine, store) = engine(intervals, concurrency);
    let count = ticks.len();

    let start = Instant::now();
    for tick in ticks {
        engine.ingest(tick).await?;
    }
    let ingest = start.elapsed();

    let snapshot = store.take_snapshot();
    let upserter = CandleUpserter::new(Arc::new(SqliteCandleRepository::open(database)?));
    let start = Instant::now();
    let candles = tokio::task::spawn_blocking(move || {
        upserter.persist(&snapshot).map(|outcome| outcome.written())
    })
    .await??;
    let persist = start.elapsed();

    Ok(BenchmarkResult {
        ticks: count,
        candles,
        ingest,
        persist,
    })
}

/// Format duration for display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs >= 1.0 {
        format!("{secs:.2}s")
    } else {
        format!("{:.1}ms", secs * 1000.0)
    }
}

/// Format a rate for display.
pub fn format_rate(per_sec: f64) -> String {
    if per_sec >= 1_000_000.0 {
        format!("{:.2}M/s", per_sec / 1_000_000.0)
    } else if per_sec >= 1_000.0 {
        format!("{:.1}K/s", per_sec / 1_000.0)
    } else {
        format!("{per_sec:.0}/s")
    }
}
