//! Repository error types.

use std::path::PathBuf;

use candela_types::CandleKey;
use thiserror::Error;

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Errors returned by candle repositories.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// SQLite rejected a statement.
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The directory holding the database could not be created.
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A candle with the same key is already stored.
    #[error("candle {0} already exists")]
    Conflict(CandleKey),

    /// The repository cannot serve requests.
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded into a candle.
    #[error("corrupt candle row {id}: {reason}")]
    CorruptRow {
        /// Row id.
        id: i64,
        /// What was wrong with it.
        reason: String,
    },
}
