//! Statements against the `rate_limits` sample table.

use crate::error::StoreResult;
use chrono::{DateTime, Utc};
use licensehub_types::LicenseKey;
use rusqlite::{Connection, params};

/// Counts samples strictly newer than `since`.
pub fn count_since(conn: &Connection, key: &LicenseKey, since: DateTime<Utc>) -> StoreResult<u32> {
    let n: u32 = conn.query_row(
        "SELECT COUNT(*) FROM rate_limits WHERE license_key = ?1 AND timestamp > ?2",
        params![key.as_str(), since.timestamp_millis()],
        |row| row.get(0),
    )?;
    Ok(n)
}

/// Appends a sample.
pub fn insert(conn: &Connection, key: &LicenseKey, at: DateTime<Utc>) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO rate_limits (license_key, timestamp) VALUES (?1, ?2)",
        params![key.as_str(), at.timestamp_millis()],
    )?;
    Ok(())
}

/// Deletes samples at or before `cutoff`, across all licenses.
pub fn prune_before(conn: &Connection, cutoff: DateTime<Utc>) -> StoreResult<usize> {
    let removed = conn.execute(
        "DELETE FROM rate_limits WHERE timestamp <= ?1",
        params![cutoff.timestamp_millis()],
    )?;
    Ok(removed)
}

/// Counts every stored sample (all licenses).
pub fn total(conn: &Connection) -> StoreResult<usize> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM rate_limits", [], |row| row.get(0))?;
    Ok(n as usize)
}
