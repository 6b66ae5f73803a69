//! Random tick generator for demos and load.

use candela_aggregate::{AggregationEngine, IngestOutcome};
use candela_types::{ShutdownSignal, Tick};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::time::MissedTickBehavior;

use crate::SimulatorConfig;

/// Generates bid/ask ticks around configured base prices.
///
/// Each tick picks a symbol uniformly, draws a price uniformly from
/// `[base, base + price_variation)` and quotes `spread` either side of it.
#[derive(Debug)]
pub struct TickSimulator {
    config: SimulatorConfig,
    rng: StdRng,
}

impl TickSimulator {
    /// Creates a simulator, seeded from `config.seed` when set.
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self { config, rng }
    }

    /// Returns the simulator settings.
    #[must_use]
    pub const fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Generates one tick stamped with `timestamp`.
    ///
    /// Returns `None` if no symbols are configured.
    pub fn next_tick(&mut self, timestamp: i64) -> Option<Tick> {
        let symbol = self.config.symbols.choose(&mut self.rng)?.clone();
        let base = self.config.base_price(&symbol);
        let price = base + self.rng.gen_range(0.0..1.0) * self.config.price_variation;
        let spread = self.config.spread;
        Some(Tick::new(symbol, (price - spread).max(0.0), price + spread, timestamp))
    }

    /// Feeds generated ticks into `engine` until `shutdown` fires.
    ///
    /// Returns the number of ticks the engine aggregated.
    pub async fn run(mut self, engine: AggregationEngine, shutdown: ShutdownSignal) -> u64 {
        let mut ticker = tokio::time::interval(self.config.event_rate());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut aggregated = 0_u64;

        tracing::info!(
            symbols = ?self.config.symbols,
            event_rate_ms = self.config.event_rate_ms,
            "Tick simulator started"
        );
        loop {
            tokio::select! {
                biased;
                () = shutdown.triggered() => break,
                _ = ticker.tick() => {}
            }

            let Some(tick) = self.next_tick(Utc::now().timestamp()) else {
                tracing::warn!("No simulator symbols configured");
                break;
            };
            match engine.ingest(tick).await {
                Ok(IngestOutcome::Aggregated { .. }) => aggregated += 1,
                Ok(IngestOutcome::Rejected) => break,
                Err(e) => tracing::warn!(error = %e, "Simulated tick was not aggregated"),
            }
        }

        tracing::info!(aggregated, "Tick simulator stopped");
        aggregated
    }
}
