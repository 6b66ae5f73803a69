//! Candle aggregation service for candela.
//!
//! This crate runs the pipeline built from the lower-level crates:
//!
//! - [`ServiceConfig`] - TOML configuration with defaults and validation
//! - [`FlushScheduler`] - Periodic snapshot-and-persist loop
//! - [`LifecycleController`] - Graceful shutdown and final drain
//! - [`HealthMonitor`] - Aggregation/persistence health and data freshness
//! - [`CandleHistory`] - Validated historical queries
//! - [`TickSimulator`] - Random tick generator
//! - [`CandleService`] - Everything above wired together

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candela/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod health;
mod history;
mod lifecycle;
mod scheduler;
mod service;
mod simulator;

pub use config::{ConfigError, FailurePolicy, ServiceConfig, SimulatorConfig};
pub use health::{DataStatus, HealthMonitor, HealthReport, HealthStatus};
pub use history::{CandleHistory, HistoryError, HistoryResponse};
pub use lifecycle::{DrainOutcome, LifecycleController};
pub use scheduler::{FlushOutcome, FlushScheduler};
pub use service::CandleService;
pub use simulator::TickSimulator;
