//! Statements against the append-only `usage_log` table.

use crate::error::StoreResult;
use licensehub_types::{Fingerprint, LicenseKey, UsageEvent, datetime_from_millis};
use rusqlite::{Connection, params};

/// Appends an audit record.
pub fn append(conn: &Connection, event: &UsageEvent) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO usage_log (license_key, fingerprint, ip_address, action, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.license_key.as_str(),
            event.fingerprint.as_ref().map(Fingerprint::as_str),
            event.origin,
            event.action,
            event.timestamp.timestamp_millis(),
        ],
    )?;
    Ok(())
}

/// Returns the most recent `limit` events for a license, newest first.
pub fn recent(conn: &Connection, key: &LicenseKey, limit: usize) -> StoreResult<Vec<UsageEvent>> {
    let mut stmt = conn.prepare(
        "SELECT fingerprint, ip_address, action, timestamp FROM usage_log
         WHERE license_key = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![key.as_str(), limit as i64], |row| {
        let fingerprint: Option<String> = row.get(0)?;
        let origin: Option<String> = row.get(1)?;
        let action: String = row.get(2)?;
        let timestamp: i64 = row.get(3)?;
        Ok((fingerprint, origin, action, timestamp))
    })?;

    let mut result = Vec::new();
    for row in rows {
        let (fingerprint, origin, action, timestamp) = row?;
        result.push(UsageEvent {
            license_key: key.clone(),
            fingerprint: fingerprint.map(Fingerprint::new).transpose()?,
            origin,
            action,
            timestamp: datetime_from_millis(timestamp)?,
        });
    }
    Ok(result)
}

/// Counts all usage events for a license.
pub fn count(conn: &Connection, key: &LicenseKey) -> StoreResult<usize> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM usage_log WHERE license_key = ?1",
        params![key.as_str()],
        |row| row.get(0),
    )?;
    Ok(n as usize)
}
