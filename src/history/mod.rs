//! History store - append-only persistence of power readings
//!
//! Each sampling tick appends one `(timestamp, total_watts, energy_wh_delta)`
//! row to SQLite. Rows are strictly ordered by timestamp and readable
//! independent of the estimation engine's in-memory state, so history
//! survives process restarts.

use crate::core::{AggregatePowerReading, Error, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Aggregation period for historical energy totals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Daily,
    Monthly,
}

/// One persisted row of the power time series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Unix timestamp (seconds) of the tick
    pub timestamp: i64,
    /// Average total draw over the tick in watts
    pub total_watts: f64,
    /// Energy consumed since the previous tick in watt-hours
    pub energy_wh_delta: f64,
    /// Per-component watts breakdown as a JSON object, if recorded
    pub components: Option<String>,
}

/// Append-only store of power readings
pub struct HistoryStore {
    conn: Connection,
    /// Timestamp of the newest stored record, re-read at open so the
    /// monotonicity check spans process restarts
    last_timestamp: Option<i64>,
    /// Elapsed interval assumed for the very first append, which has no
    /// predecessor tick
    default_elapsed_secs: u64,
}

impl HistoryStore {
    /// Open (or create) the store at the given path
    pub fn open<P: AsRef<Path>>(path: P, default_elapsed_secs: u64) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, default_elapsed_secs)
    }

    /// In-memory store, used by tests
    pub fn open_in_memory(default_elapsed_secs: u64) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, default_elapsed_secs)
    }

    fn from_connection(conn: Connection, default_elapsed_secs: u64) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                timestamp INTEGER NOT NULL,
                total_watts REAL NOT NULL,
                energy_wh_delta REAL NOT NULL,
                components TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history(timestamp);
            "#,
        )?;

        let last_timestamp: Option<i64> =
            conn.query_row("SELECT MAX(timestamp) FROM history", [], |row| row.get(0))?;

        Ok(Self {
            conn,
            last_timestamp,
            default_elapsed_secs,
        })
    }

    /// Append one tick's reading, converting it to an energy delta
    ///
    /// `energy_wh_delta = total_watts * elapsed_hours`, where elapsed is the
    /// gap to the previous stored tick. The first-ever append uses the
    /// configured default elapsed interval. Appends must be monotonic in
    /// timestamp; an out-of-order append fails with `NonMonotonicTimestamp`
    /// and leaves stored state untouched. The insert is a single statement,
    /// so concurrent readers observe either the pre- or post-append state.
    pub fn append(&mut self, reading: &AggregatePowerReading) -> Result<HistoryRecord> {
        let elapsed_secs = match self.last_timestamp {
            Some(last) => {
                if reading.timestamp <= last {
                    return Err(Error::NonMonotonicTimestamp {
                        last,
                        attempted: reading.timestamp,
                    });
                }
                (reading.timestamp - last) as f64
            }
            None => self.default_elapsed_secs as f64,
        };

        let energy_wh_delta = reading.total_watts * elapsed_secs / 3600.0;
        let components = if reading.readings.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&reading.per_component())
                    .map_err(|e| Error::Serialization(e.to_string()))?,
            )
        };

        self.conn.execute(
            "INSERT INTO history (timestamp, total_watts, energy_wh_delta, components)
             VALUES (?1, ?2, ?3, ?4)",
            params![reading.timestamp, reading.total_watts, energy_wh_delta, components],
        )?;
        self.last_timestamp = Some(reading.timestamp);

        Ok(HistoryRecord {
            timestamp: reading.timestamp,
            total_watts: reading.total_watts,
            energy_wh_delta,
            components,
        })
    }

    /// Records in `[start, end]`, ordered by timestamp
    pub fn query_range(&self, start: i64, end: i64) -> Result<Vec<HistoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, total_watts, energy_wh_delta, components
             FROM history
             WHERE timestamp >= ?1 AND timestamp <= ?2
             ORDER BY timestamp ASC",
        )?;

        let records = stmt
            .query_map(params![start, end], |row| {
                Ok(HistoryRecord {
                    timestamp: row.get(0)?,
                    total_watts: row.get(1)?,
                    energy_wh_delta: row.get(2)?,
                    components: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Total energy in Wh per period key ("YYYY-MM-DD" or "YYYY-MM", UTC)
    pub fn aggregate(&self, period: Period) -> Result<BTreeMap<String, f64>> {
        let format = match period {
            Period::Daily => "%Y-%m-%d",
            Period::Monthly => "%Y-%m",
        };

        let mut stmt = self.conn.prepare(
            "SELECT strftime(?1, timestamp, 'unixepoch') AS period, SUM(energy_wh_delta)
             FROM history
             GROUP BY period
             ORDER BY period ASC",
        )?;

        let totals = stmt
            .query_map(params![format], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

        Ok(totals)
    }

    /// Summed energy in Wh for records at or after `timestamp`
    pub fn energy_since(&self, timestamp: i64) -> Result<f64> {
        let total: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(energy_wh_delta), 0.0) FROM history WHERE timestamp >= ?1",
            params![timestamp],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Delete records older than the retention window
    pub fn prune_older_than(&self, retention_days: u32) -> Result<u64> {
        let cutoff = chrono::Utc::now().timestamp() - (retention_days as i64 * 24 * 60 * 60);
        let deleted = self.conn.execute(
            "DELETE FROM history WHERE timestamp < ?1",
            params![cutoff],
        )?;
        Ok(deleted as u64)
    }

    /// Number of stored records
    pub fn record_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Timestamp of the newest stored record
    pub fn last_timestamp(&self) -> Option<i64> {
        self.last_timestamp
    }
}
