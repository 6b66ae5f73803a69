//! Concurrent tick-to-OHLCV candle aggregation with durable persistence.
//!
//! This is a facade crate that re-exports functionality from the candela
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```ignore
//! use candela_lib::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository = Arc::new(SqliteCandleRepository::open("candles.sqlite")?);
//!     let service = CandleService::new(ServiceConfig::default(), repository)?;
//!     service.start();
//!
//!     service.ingest(Tick::new("BTC-USD", 30000.0, 30100.0, 1_700_000_000)).await?;
//!
//!     let outcome = service.shutdown().await;
//!     println!("Drained: {outcome:?}");
//!     Ok(())
//! }
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candela/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use candela_types::*;

// Re-export aggregation
pub use candela_aggregate::{
    AggregationEngine, Applied, CandleStore, EngineConfig, IngestOutcome, PriceOrdering,
    WorkerPool,
};

// Re-export persistence
pub use candela_store::{
    AggregateUpdate, CandleRepository, CandleTransaction, CandleUpserter,
    MemoryCandleRepository, PersistOutcome, RepositoryError, StoredCandle,
};

#[cfg(feature = "sqlite")]
pub use candela_store::SqliteCandleRepository;

// Re-export the service
#[cfg(feature = "service")]
pub use candela_service::{
    CandleHistory, CandleService, ConfigError, DataStatus, DrainOutcome, FailurePolicy,
    FlushOutcome, FlushScheduler, HealthMonitor, HealthReport, HealthStatus, HistoryError,
    HistoryResponse, LifecycleController, ServiceConfig, SimulatorConfig, TickSimulator,
};

/// Prelude module for convenient imports.
///
/// ```
/// use candela_lib::prelude::*;
/// ```
pub mod prelude {
    pub use candela_types::{
        CandelaError, Candle, CandleKey, Interval, Result, ShutdownSignal, Tick,
    };

    pub use candela_aggregate::{AggregationEngine, IngestOutcome, PriceOrdering};

    pub use candela_store::{CandleRepository, MemoryCandleRepository};

    #[cfg(feature = "sqlite")]
    pub use candela_store::SqliteCandleRepository;

    #[cfg(feature = "service")]
    pub use candela_service::{
        CandleService, DrainOutcome, FailurePolicy, FlushOutcome, HealthReport, ServiceConfig,
    };
}
