//! Tick data representation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single bid/ask quote observation for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Symbol the quote belongs to (e.g. "BTC-USD").
    pub symbol: String,
    /// Bid price.
    pub bid: f64,
    /// Ask (offer) price.
    pub ask: f64,
    /// Event time in seconds since the Unix epoch.
    pub timestamp: i64,
}

impl Tick {
    /// Creates a new tick.
    #[must_use]
    pub fn new(symbol: impl Into<String>, bid: f64, ask: f64, timestamp: i64) -> Self {
        Self {
            symbol: symbol.into(),
            bid,
            ask,
            timestamp,
        }
    }

    /// Returns the mid price (average of bid and ask).
    #[must_use]
    pub fn mid(&self) -> f64 {
        self.mid_with_divisor(2.0)
    }

    /// Returns `(bid + ask) / divisor`.
    #[must_use]
    pub fn mid_with_divisor(&self, divisor: f64) -> f64 {
        (self.bid + self.ask) / divisor
    }

    /// Returns the spread (ask - bid).
    #[must_use]
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Checks the tick invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), InvalidTick> {
        if self.symbol.trim().is_empty() {
            return Err(InvalidTick::EmptySymbol);
        }
        if !self.bid.is_finite() || !self.ask.is_finite() {
            return Err(InvalidTick::NonFinitePrice {
                bid: self.bid,
                ask: self.ask,
            });
        }
        if self.bid < 0.0 {
            return Err(InvalidTick::NegativeBid(self.bid));
        }
        if self.ask < 0.0 {
            return Err(InvalidTick::NegativeAsk(self.ask));
        }
        if self.bid > self.ask {
            return Err(InvalidTick::CrossedQuote {
                bid: self.bid,
                ask: self.ask,
            });
        }
        if self.timestamp <= 0 {
            return Err(InvalidTick::NonPositiveTimestamp(self.timestamp));
        }
        Ok(())
    }
}

/// A tick that violates one of the quote invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidTick {
    /// Symbol is empty or whitespace.
    #[error("symbol cannot be empty")]
    EmptySymbol,

    /// Bid or ask is NaN or infinite.
    #[error("prices must be finite, bid: {bid}, ask: {ask}")]
    NonFinitePrice {
        /// The offending bid.
        bid: f64,
        /// The offending ask.
        ask: f64,
    },

    /// Bid is below zero.
    #[error("bid must be non-negative, got: {0}")]
    NegativeBid(f64),

    /// Ask is below zero.
    #[error("ask must be non-negative, got: {0}")]
    NegativeAsk(f64),

    /// Bid is above ask.
    #[error("bid cannot be greater than ask, bid: {bid}, ask: {ask}")]
    CrossedQuote {
        /// The offending bid.
        bid: f64,
        /// The offending ask.
        ask: f64,
    },

    /// Timestamp is zero or negative.
    #[error("timestamp must be positive, got: {0}")]
    NonPositiveTimestamp(i64),
}
