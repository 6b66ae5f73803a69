//! Historical candle queries.

use std::sync::Arc;

use candela_store::{CandleRepository, RepositoryError, StoredCandle};
use candela_types::Interval;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by [`CandleHistory::query`].
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The request parameters are invalid.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The repository failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Columnar candle history, one entry per candle in each column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Status, always `"ok"`.
    pub s: String,
    /// Open times.
    pub t: Vec<i64>,
    /// Open prices.
    pub o: Vec<f64>,
    /// High prices.
    pub h: Vec<f64>,
    /// Low prices.
    pub l: Vec<f64>,
    /// Close prices.
    pub c: Vec<f64>,
    /// Volumes.
    pub v: Vec<i64>,
}

impl HistoryResponse {
    fn from_stored(candles: Vec<StoredCandle>) -> Self {
        let n = candles.len();
        let mut response = Self {
            s: "ok".to_string(),
            t: Vec::with_capacity(n),
            o: Vec::with_capacity(n),
            h: Vec::with_capacity(n),
            l: Vec::with_capacity(n),
            c: Vec::with_capacity(n),
            v: Vec::with_capacity(n),
        };
        for StoredCandle { candle, .. } in candles {
            response.t.push(candle.open_time);
            response.o.push(candle.open);
            response.h.push(candle.high);
            response.l.push(candle.low);
            response.c.push(candle.close);
            response.v.push(candle.volume);
        }
        response
    }

    /// Returns the number of candles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.t.len()
    }

    /// Returns true if no candles matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

/// Read side over the candle repository.
#[derive(Debug)]
pub struct CandleHistory<R> {
    repository: Arc<R>,
    symbols: Vec<String>,
}

impl<R: CandleRepository> CandleHistory<R> {
    /// Creates a history reader. An empty `symbols` list accepts any symbol.
    #[must_use]
    pub const fn new(repository: Arc<R>, symbols: Vec<String>) -> Self {
        Self {
            repository,
            symbols,
        }
    }

    /// Returns candles with `from <= open_time <= to`, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::BadRequest`] if the symbol is blank or not
    /// configured, the interval is unsupported, `from >= to`, or either
    /// bound is negative.
    pub fn query(
        &self,
        symbol: &str,
        interval: &str,
        from: i64,
        to: i64,
    ) -> Result<HistoryResponse, HistoryError> {
        let symbol = self.validate_symbol(symbol)?;
        let interval = validate_interval(interval)?;
        validate_range(from, to)?;

        let candles = self
            .repository
            .find_by_key_range(symbol, interval, from, to)?;
        tracing::debug!(symbol, %interval, from, to, count = candles.len(), "Served candle history");
        Ok(HistoryResponse::from_stored(candles))
    }

    fn validate_symbol<'a>(&self, symbol: &'a str) -> Result<&'a str, HistoryError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(bad_request("symbol cannot be empty"));
        }
        if !self.symbols.is_empty() && !self.symbols.iter().any(|s| s == symbol) {
            return Err(bad_request(format!(
                "unsupported symbol: {symbol}, supported symbols: {}",
                self.symbols.join(", ")
            )));
        }
        Ok(symbol)
    }
}

fn validate_interval(interval: &str) -> Result<Interval, HistoryError> {
    if interval.trim().is_empty() {
        return Err(bad_request("interval cannot be empty"));
    }
    interval.parse().map_err(|e: candela_types::UnsupportedInterval| bad_request(e.to_string()))
}

fn validate_range(from: i64, to: i64) -> Result<(), HistoryError> {
    if from >= to {
        return Err(bad_request("from must be less than to"));
    }
    if from < 0 || to < 0 {
        return Err(bad_request("timestamps cannot be negative"));
    }
    Ok(())
}

fn bad_request(message: impl Into<String>) -> HistoryError {
    HistoryError::BadRequest(message.into())
}
