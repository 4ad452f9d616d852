//! SQLite-backed detection store.
//!
//! Timestamps are kept as UTC milliseconds so that `ORDER BY` gives the
//! feed order directly; the producer's `date`/`time` strings are stored
//! verbatim alongside.

use crate::prelude::{RecordStore, StoreError, StoreResult};
use crate::record::{Detection, Snapshot};
use chrono::DateTime;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const MINUTE_MS: i64 = 60_000;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS detections (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp_ms INTEGER NOT NULL,
        location     TEXT    NOT NULL,
        source       INTEGER NOT NULL,
        date         TEXT    NOT NULL,
        time         TEXT    NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_detections_timestamp ON detections (timestamp_ms);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a record as-is.
    #[cfg(test)]
    pub fn insert(&self, detection: &Detection) -> StoreResult<()> {
        let conn = self.lock();
        insert_row(&conn, detection)?;
        Ok(())
    }

    /// Appends a record and collapses the minute it falls in.
    ///
    /// After the insert only the newest row sharing source, location and
    /// date within the same wall-clock minute survives. Returns the
    /// number of rows removed.
    pub fn record_detection(&self, detection: &Detection) -> StoreResult<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        insert_row(&tx, detection)?;

        let ts = detection.timestamp.timestamp_millis();
        let start = ts - ts.rem_euclid(MINUTE_MS);
        let end = start + MINUTE_MS;

        let latest: i64 = tx.query_row(
            "SELECT id FROM detections
             WHERE timestamp_ms >= ?1 AND timestamp_ms < ?2
               AND location = ?3 AND date = ?4 AND source = ?5
             ORDER BY timestamp_ms DESC, id DESC
             LIMIT 1",
            params![start, end, detection.location, detection.date, detection.source],
            |row| row.get(0),
        )?;
        let removed = tx.execute(
            "DELETE FROM detections
             WHERE id != ?1
               AND timestamp_ms >= ?2 AND timestamp_ms < ?3
               AND location = ?4 AND date = ?5 AND source = ?6",
            params![
                latest,
                start,
                end,
                detection.location,
                detection.date,
                detection.source
            ],
        )?;
        tx.commit()?;

        if removed > 0 {
            log::debug!(
                "collapsed {} older detections for source {} at {}",
                removed,
                detection.source,
                detection.location
            );
        }
        Ok(removed)
    }

    pub fn count(&self) -> StoreResult<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM detections", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }
}

fn insert_row(conn: &Connection, detection: &Detection) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO detections (timestamp_ms, location, source, date, time)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            detection.timestamp.timestamp_millis(),
            detection.location,
            detection.source,
            detection.date,
            detection.time
        ],
    )
}

impl RecordStore for SqliteStore {
    fn fetch_all(&self) -> StoreResult<Snapshot> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp_ms, location, source, date, time
             FROM detections
             ORDER BY timestamp_ms DESC, location ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (id, timestamp_ms, location, source, date, time) in rows {
            let timestamp = DateTime::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
                StoreError::CorruptRecord {
                    id,
                    reason: format!("timestamp {} out of range", timestamp_ms),
                }
            })?;
            records.push(Detection::new(timestamp, location, source, date, time));
        }
        Ok(Snapshot::from_ordered(records))
    }
}
