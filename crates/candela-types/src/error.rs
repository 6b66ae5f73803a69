//! Error types for candela.

use thiserror::Error;

use crate::{Interval, InvalidTick, UnsupportedInterval};

/// Result type alias for candela operations.
pub type Result<T> = std::result::Result<T, CandelaError>;

/// Errors surfaced by the aggregation and persistence core.
#[derive(Error, Debug)]
pub enum CandelaError {
    /// Tick failed validation and was not aggregated.
    #[error("invalid tick: {0}")]
    InvalidTick(#[from] InvalidTick),

    /// An interval string names no supported interval.
    #[error(transparent)]
    UnsupportedInterval(#[from] UnsupportedInterval),

    /// Aggregating a tick into one interval failed.
    #[error("aggregation failed for interval {interval}: {reason}")]
    AggregationFailure {
        /// The interval that could not be updated.
        interval: Interval,
        /// Why the update failed.
        reason: String,
    },

    /// A flush or drain batch could not be persisted.
    #[error("persistence failed: {0}")]
    PersistenceFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CandelaError {
    /// Wraps a storage error as a [`CandelaError::PersistenceFailure`].
    pub fn persistence<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::PersistenceFailure(Box::new(source))
    }
}
