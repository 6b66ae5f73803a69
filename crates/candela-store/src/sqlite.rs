//! SQLite candle repository.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use candela_types::{Candle, CandleKey, Interval};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};

use crate::{
    AggregateUpdate, CandleRepository, CandleTransaction, RepositoryError, Result, StoredCandle,
};

/// Open times looked up per statement; keeps well under SQLite's
/// host-parameter limit once symbol and interval are bound.
const LOOKUP_CHUNK: usize = 500;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS candles (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol          TEXT    NOT NULL,
    candle_interval TEXT    NOT NULL,
    open_time       INTEGER NOT NULL,
    open_price      REAL    NOT NULL,
    high_price      REAL    NOT NULL,
    low_price       REAL    NOT NULL,
    close_price     REAL    NOT NULL,
    volume          INTEGER NOT NULL,
    UNIQUE (symbol, candle_interval, open_time)
);
";

const COLUMNS: &str = "id, symbol, candle_interval, open_time, \
                       open_price, high_price, low_price, close_price, volume";

/// Repository backed by a single SQLite connection.
#[derive(Debug)]
pub struct SqliteCandleRepository {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteCandleRepository {
    /// Opens (creating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened and initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| RepositoryError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "Opened candle database");
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Returns the database file path, or `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the number of stored candles.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM candles", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CandleRepository for SqliteCandleRepository {
    type Transaction<'a> = SqliteTransaction<'a>;

    fn begin(&self) -> Result<SqliteTransaction<'_>> {
        let conn = self.lock();
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(SqliteTransaction {
            conn,
            finished: false,
        })
    }

    fn find_by_key(&self, key: &CandleKey) -> Result<Option<StoredCandle>> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM candles \
                     WHERE symbol = ?1 AND candle_interval = ?2 AND open_time = ?3"
                ),
                params![key.symbol, key.interval.as_str(), key.open_time],
                RawRow::read,
            )
            .optional()?;
        raw.map(RawRow::decode).transpose()
    }

    fn find_by_key_range(
        &self,
        symbol: &str,
        interval: Interval,
        from: i64,
        to: i64,
    ) -> Result<Vec<StoredCandle>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {COLUMNS} FROM candles \
             WHERE symbol = ?1 AND candle_interval = ?2 AND open_time BETWEEN ?3 AND ?4 \
             ORDER BY open_time ASC"
        ))?;
        let rows = stmt
            .query_map(params![symbol, interval.as_str(), from, to], RawRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawRow::decode).collect()
    }
}

/// Unit of work on a [`SqliteCandleRepository`].
///
/// Holds the connection for its whole lifetime. Rolled back on drop unless
/// committed.
#[derive(Debug)]
pub struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl CandleTransaction for SqliteTransaction<'_> {
    fn find_by_keys_in(
        &mut self,
        symbol: &str,
        interval: Interval,
        open_times: &[i64],
    ) -> Result<Vec<StoredCandle>> {
        let mut found = Vec::with_capacity(open_times.len());
        for chunk in open_times.chunks(LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {COLUMNS} FROM candles \
                 WHERE symbol = ? AND candle_interval = ? AND open_time IN ({placeholders})"
            ))?;

            let mut values = Vec::with_capacity(chunk.len() + 2);
            values.push(Value::Text(symbol.to_string()));
            values.push(Value::Text(interval.as_str().to_string()));
            values.extend(chunk.iter().map(|&open_time| Value::Integer(open_time)));

            let rows = stmt
                .query_map(params_from_iter(values), RawRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for raw in rows {
                found.push(raw.decode()?);
            }
        }
        Ok(found)
    }

    fn update_aggregate(&mut self, id: i64, update: &AggregateUpdate) -> Result<usize> {
        let mut stmt = self.conn.prepare_cached(
            "UPDATE candles SET \
                 high_price = MAX(high_price, ?1), \
                 low_price = MIN(low_price, ?2), \
                 close_price = ?3, \
                 volume = volume + ?4 \
             WHERE id = ?5",
        )?;
        Ok(stmt.execute(params![
            update.high,
            update.low,
            update.close,
            update.volume_delta,
            id
        ])?)
    }

    fn bulk_insert(&mut self, candles: &[Candle]) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO candles (symbol, candle_interval, open_time, \
                                  open_price, high_price, low_price, close_price, volume) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for candle in candles {
            let inserted = stmt.execute(params![
                candle.symbol,
                candle.interval.as_str(),
                candle.open_time,
                candle.open,
                candle.high,
                candle.low,
                candle.close,
                candle.volume,
            ]);
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(RepositoryError::Conflict(candle.key()));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "Failed to roll back candle transaction");
            }
        }
    }
}

struct RawRow {
    id: i64,
    symbol: String,
    interval: String,
    open_time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            symbol: row.get(1)?,
            interval: row.get(2)?,
            open_time: row.get(3)?,
            open: row.get(4)?,
            high: row.get(5)?,
            low: row.get(6)?,
            close: row.get(7)?,
            volume: row.get(8)?,
        })
    }

    fn decode(self) -> Result<StoredCandle> {
        let interval: Interval =
            self.interval
                .parse()
                .map_err(|e: candela_types::UnsupportedInterval| RepositoryError::CorruptRow {
                    id: self.id,
                    reason: e.to_string(),
                })?;
        Ok(StoredCandle {
            id: self.id,
            candle: Candle {
                symbol: self.symbol,
                interval,
                open_time: self.open_time,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
                volume: self.volume,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn candle(open_time: i64, price: f64) -> Candle {
        Candle::opened(CandleKey::new("BTC-USD", Interval::Second1, open_time), price)
    }

    fn insert(repo: &SqliteCandleRepository, candles: &[Candle]) {
        let mut tx = repo.begin().unwrap();
        tx.bulk_insert(candles).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("candles.sqlite");

        let repo = SqliteCandleRepository::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(repo.path(), Some(path.as_path()));
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("candles.sqlite");

        {
            let repo = SqliteCandleRepository::open(&path).unwrap();
            insert(&repo, &[candle(1000, 30050.0)]);
        }

        let repo = SqliteCandleRepository::open(&path).unwrap();
        let stored = repo
            .find_by_key(&CandleKey::new("BTC-USD", Interval::Second1, 1000))
            .unwrap()
            .unwrap();
        assert_eq!(stored.candle, candle(1000, 30050.0));
    }

    #[test]
    fn test_find_by_key_missing() {
        let repo = SqliteCandleRepository::open_in_memory().unwrap();
        assert!(
            repo.find_by_key(&CandleKey::new("BTC-USD", Interval::Second1, 1))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_update_aggregate_merges_in_sql() {
        let repo = SqliteCandleRepository::open_in_memory().unwrap();
        let mut stored = candle(1000, 100.0);
        stored.high = 110.0;
        stored.low = 95.0;
        stored.close = 105.0;
        stored.volume = 3;
        insert(&repo, &[stored]);

        let mut tx = repo.begin().unwrap();
        let id = tx
            .find_by_keys_in("BTC-USD", Interval::Second1, &[1000])
            .unwrap()[0]
            .id;
        let update = AggregateUpdate {
            high: 108.0,
            low: 90.0,
            close: 99.0,
            volume_delta: 2,
        };
        assert_eq!(tx.update_aggregate(id, &update).unwrap(), 1);
        assert_eq!(tx.update_aggregate(id + 100, &update).unwrap(), 0);
        tx.commit().unwrap();

        let merged = repo
            .find_by_key(&CandleKey::new("BTC-USD", Interval::Second1, 1000))
            .unwrap()
            .unwrap()
            .candle;
        assert_relative_eq!(merged.open, 100.0);
        assert_relative_eq!(merged.high, 110.0);
        assert_relative_eq!(merged.low, 90.0);
        assert_relative_eq!(merged.close, 99.0);
        assert_eq!(merged.volume, 5);
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let repo = SqliteCandleRepository::open_in_memory().unwrap();
        {
            let mut tx = repo.begin().unwrap();
            tx.bulk_insert(&[candle(1000, 1.0)]).unwrap();
        }
        assert_eq!(repo.count().unwrap(), 0);

        // The connection is usable again after the rollback.
        insert(&repo, &[candle(1000, 1.0)]);
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_insert_conflicts() {
        let repo = SqliteCandleRepository::open_in_memory().unwrap();
        insert(&repo, &[candle(1000, 1.0)]);

        let mut tx = repo.begin().unwrap();
        let err = tx.bulk_insert(&[candle(1000, 2.0)]).unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(key) if key.open_time == 1000));
    }

    #[test]
    fn test_lookup_spans_chunks() {
        let repo = SqliteCandleRepository::open_in_memory().unwrap();
        let candles: Vec<Candle> = (0..1_200).map(|t| candle(t, 1.0)).collect();
        insert(&repo, &candles);

        let wanted: Vec<i64> = (0..1_300).collect();
        let mut tx = repo.begin().unwrap();
        let found = tx
            .find_by_keys_in("BTC-USD", Interval::Second1, &wanted)
            .unwrap();
        assert_eq!(found.len(), 1_200);
        assert!(
            tx.find_by_keys_in("BTC-USD", Interval::Second1, &[])
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_key_range_is_inclusive_and_ordered() {
        let repo = SqliteCandleRepository::open_in_memory().unwrap();
        insert(
            &repo,
            &[candle(1003, 4.0), candle(1000, 1.0), candle(1002, 3.0), candle(1001, 2.0)],
        );

        let found = repo
            .find_by_key_range("BTC-USD", Interval::Second1, 1001, 1003)
            .unwrap();
        let times: Vec<i64> = found.iter().map(|s| s.candle.open_time).collect();
        assert_eq!(times, vec![1001, 1002, 1003]);
        assert!(
            repo.find_by_key_range("BTC-USD", Interval::Minute1, 0, 5_000)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_corrupt_interval_is_reported() {
        let raw = RawRow {
            id: 7,
            symbol: "BTC-USD".to_string(),
            interval: "7m".to_string(),
            open_time: 1000,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1,
        };
        assert!(matches!(
            raw.decode(),
            Err(RepositoryError::CorruptRow { id: 7, .. })
        ));
    }
}
