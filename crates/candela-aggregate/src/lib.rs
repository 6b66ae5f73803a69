//! In-memory aggregation for candela.
//!
//! This crate turns validated ticks into candles:
//!
//! - [`CandleStore`] - Concurrent map of active candles with atomic snapshots
//! - [`WorkerPool`] - Bounded executor for per-interval tasks
//! - [`AggregationEngine`] - Fans each tick out to every configured interval

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candela/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod engine;
mod pool;
mod store;

pub use engine::{AggregationEngine, EngineConfig, IngestOutcome};
pub use pool::WorkerPool;
pub use store::{Applied, CandleStore, PriceOrdering};
