//! Statements against the `devices` table.

use crate::error::StoreResult;
use chrono::{DateTime, Utc};
use licensehub_types::{DeviceBinding, Fingerprint, LicenseKey, datetime_from_millis};
use rusqlite::{Connection, params};

/// Refreshes `last_seen` for a bound fingerprint. Returns false if unbound.
pub fn touch(
    conn: &Connection,
    key: &LicenseKey,
    fingerprint: &Fingerprint,
    now: DateTime<Utc>,
) -> StoreResult<bool> {
    let changed = conn.execute(
        "UPDATE devices SET last_seen = ?3 WHERE license_key = ?1 AND fingerprint = ?2",
        params![key.as_str(), fingerprint.as_str(), now.timestamp_millis()],
    )?;
    Ok(changed > 0)
}

/// Counts bindings for a license.
pub fn count(conn: &Connection, key: &LicenseKey) -> StoreResult<u32> {
    let n: u32 = conn.query_row(
        "SELECT COUNT(*) FROM devices WHERE license_key = ?1",
        params![key.as_str()],
        |row| row.get(0),
    )?;
    Ok(n)
}

/// Binds a new fingerprint.
pub fn insert(
    conn: &Connection,
    key: &LicenseKey,
    fingerprint: &Fingerprint,
    now: DateTime<Utc>,
) -> StoreResult<()> {
    let millis = now.timestamp_millis();
    conn.execute(
        "INSERT INTO devices (license_key, fingerprint, registered_at, last_seen) VALUES (?1, ?2, ?3, ?4)",
        params![key.as_str(), fingerprint.as_str(), millis, millis],
    )?;
    Ok(())
}

/// Removes every binding for a license. Returns the number removed.
pub fn delete_all(conn: &Connection, key: &LicenseKey) -> StoreResult<usize> {
    let removed = conn.execute(
        "DELETE FROM devices WHERE license_key = ?1",
        params![key.as_str()],
    )?;
    Ok(removed)
}

/// Lists bindings for a license in registration order.
pub fn list(conn: &Connection, key: &LicenseKey) -> StoreResult<Vec<DeviceBinding>> {
    let mut stmt = conn.prepare(
        "SELECT fingerprint, registered_at, last_seen FROM devices
         WHERE license_key = ?1 ORDER BY registered_at, id",
    )?;
    let rows = stmt.query_map(params![key.as_str()], |row| {
        let fingerprint: String = row.get(0)?;
        let registered_at: i64 = row.get(1)?;
        let last_seen: Option<i64> = row.get(2)?;
        Ok((fingerprint, registered_at, last_seen))
    })?;

    let mut result = Vec::new();
    for row in rows {
        let (fingerprint, registered_at, last_seen) = row?;
        result.push(DeviceBinding {
            license_key: key.clone(),
            fingerprint: Fingerprint::new(fingerprint)?,
            registered_at: datetime_from_millis(registered_at)?,
            last_seen: last_seen.map(datetime_from_millis).transpose()?,
        });
    }
    Ok(result)
}
