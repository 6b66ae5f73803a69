//! Candle (OHLCV) data structure.

use serde::{Deserialize, Serialize};

use crate::Interval;

/// Unique identity of a candle: one bucket of one interval for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandleKey {
    /// Symbol the candle summarizes.
    pub symbol: String,
    /// Bucket width.
    pub interval: Interval,
    /// Aligned bucket start, seconds since the Unix epoch.
    pub open_time: i64,
}

impl CandleKey {
    /// Creates a new candle key.
    #[must_use]
    pub fn new(symbol: impl Into<String>, interval: Interval, open_time: i64) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            open_time,
        }
    }
}

impl std::fmt::Display for CandleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.symbol, self.interval, self.open_time)
    }
}

/// OHLCV summary of every tick aligned to one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Symbol the candle summarizes.
    pub symbol: String,
    /// Bucket width.
    pub interval: Interval,
    /// Aligned bucket start, seconds since the Unix epoch.
    pub open_time: i64,
    /// Opening price (first applied mid price).
    pub open: f64,
    /// Highest mid price in the bucket.
    pub high: f64,
    /// Lowest mid price in the bucket.
    pub low: f64,
    /// Closing price (last applied mid price).
    pub close: f64,
    /// Number of ticks merged into the candle.
    pub volume: i64,
}

impl Candle {
    /// Creates a candle from its first tick's price.
    #[must_use]
    pub fn opened(key: CandleKey, price: f64) -> Self {
        Self {
            symbol: key.symbol,
            interval: key.interval,
            open_time: key.open_time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 1,
        }
    }

    /// Returns the key identifying this candle.
    #[must_use]
    pub fn key(&self) -> CandleKey {
        CandleKey::new(self.symbol.clone(), self.interval, self.open_time)
    }

    /// Folds one more tick price into the candle. `open` is left untouched.
    pub fn merge_price(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += 1;
    }

    /// Folds a candle built from ticks that arrived after this one's.
    ///
    /// Keeps this candle's `open`, takes `later`'s `close`, and combines the
    /// extremes and volumes. Both candles must share a key.
    pub fn absorb_later(&mut self, later: &Self) {
        debug_assert_eq!(self.key(), later.key());
        self.high = self.high.max(later.high);
        self.low = self.low.min(later.low);
        self.close = later.close;
        self.volume += later.volume;
    }

    /// Returns the price range (high - low).
    #[must_use]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}
