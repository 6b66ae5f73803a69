//! Repository contract for stored candles.

use candela_types::{Candle, CandleKey, Interval};

use crate::Result;

/// A candle together with its repository row id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCandle {
    /// Row id assigned by the repository.
    pub id: i64,
    /// The stored candle.
    pub candle: Candle,
}

/// Merge applied to an already stored candle.
///
/// `open` is never part of an update: the stored row always predates the
/// candle being merged into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateUpdate {
    /// Candidate high; the stored high becomes the larger of the two.
    pub high: f64,
    /// Candidate low; the stored low becomes the smaller of the two.
    pub low: f64,
    /// Replaces the stored close.
    pub close: f64,
    /// Added to the stored volume.
    pub volume_delta: i64,
}

impl From<&Candle> for AggregateUpdate {
    fn from(candle: &Candle) -> Self {
        Self {
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume_delta: candle.volume,
        }
    }
}

impl AggregateUpdate {
    /// Applies the merge to `candle` in place.
    pub fn apply_to(&self, candle: &mut Candle) {
        candle.high = candle.high.max(self.high);
        candle.low = candle.low.min(self.low);
        candle.close = self.close;
        candle.volume += self.volume_delta;
    }
}

/// Storage for closed-or-flushed candles, unique per [`CandleKey`].
///
/// Reads run directly on the repository. Writes go through a
/// [`CandleTransaction`] obtained from [`begin`](Self::begin).
pub trait CandleRepository: Send + Sync {
    /// Unit of work returned by [`begin`](Self::begin).
    type Transaction<'a>: CandleTransaction
    where
        Self: 'a;

    /// Starts a unit of work.
    fn begin(&self) -> Result<Self::Transaction<'_>>;

    /// Looks up the candle stored under `key`.
    fn find_by_key(&self, key: &CandleKey) -> Result<Option<StoredCandle>>;

    /// Returns candles with `from <= open_time <= to`, ascending by open time.
    fn find_by_key_range(
        &self,
        symbol: &str,
        interval: Interval,
        from: i64,
        to: i64,
    ) -> Result<Vec<StoredCandle>>;
}

/// Write operations grouped into one atomic unit.
///
/// Nothing is visible to other readers until [`commit`](Self::commit).
/// Dropping the transaction without committing rolls it back.
pub trait CandleTransaction {
    /// Returns the stored candles of one symbol and interval whose open time
    /// is in `open_times`. Missing keys are skipped.
    fn find_by_keys_in(
        &mut self,
        symbol: &str,
        interval: Interval,
        open_times: &[i64],
    ) -> Result<Vec<StoredCandle>>;

    /// Merges `update` into the row with `id`, returning the rows affected.
    fn update_aggregate(&mut self, id: i64, update: &AggregateUpdate) -> Result<usize>;

    /// Inserts new candles.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`](crate::RepositoryError::Conflict)
    /// if a key is already stored.
    fn bulk_insert(&mut self, candles: &[Candle]) -> Result<()>;

    /// Makes every write of this unit visible.
    fn commit(self) -> Result<()>;
}
