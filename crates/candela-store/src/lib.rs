//! Candle persistence for candela.
//!
//! - [`CandleRepository`] / [`CandleTransaction`] - Storage contract with an
//!   explicit unit of work
//! - [`MemoryCandleRepository`] - Process-local repository
//! - [`SqliteCandleRepository`] - SQLite repository (feature `sqlite`)
//! - [`CandleUpserter`] - Merges flushed candles into stored rows

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candela/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod memory;
mod repository;
#[cfg(feature = "sqlite")]
mod sqlite;
mod upsert;

pub use error::{RepositoryError, Result};
pub use memory::{MemoryCandleRepository, MemoryTransaction};
pub use repository::{AggregateUpdate, CandleRepository, CandleTransaction, StoredCandle};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteCandleRepository, SqliteTransaction};
pub use upsert::{CandleUpserter, PersistOutcome};
