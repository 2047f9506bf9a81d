//! Statements against the `licenses` table.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use licensehub_types::{LicenseKey, LicenseRecord, datetime_from_millis};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "license_key, email, company_name, credits_total, credits_used, \
                       reset_date, active, created_at, last_used";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fields supplied when a license is first inserted.
#[derive(Debug, Clone)]
pub struct NewLicense<'a> {
    pub key: &'a LicenseKey,
    pub email: &'a str,
    pub company: Option<&'a str>,
    pub credits_total: i64,
    pub reset_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Column values as read from SQLite, before validation.
struct RawLicense {
    key: String,
    email: String,
    company: Option<String>,
    credits_total: i64,
    credits_used: i64,
    reset_date: String,
    active: bool,
    created_at: i64,
    last_used: Option<i64>,
}

impl RawLicense {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            email: row.get(1)?,
            company: row.get(2)?,
            credits_total: row.get(3)?,
            credits_used: row.get(4)?,
            reset_date: row.get(5)?,
            active: row.get(6)?,
            created_at: row.get(7)?,
            last_used: row.get(8)?,
        })
    }

    fn into_record(self) -> StoreResult<LicenseRecord> {
        Ok(LicenseRecord {
            key: LicenseKey::parse(&self.key)?,
            email: self.email,
            company: self.company.filter(|c| !c.is_empty()),
            credits_total: self.credits_total,
            credits_used: self.credits_used,
            reset_date: parse_date(&self.reset_date)?,
            active: self.active,
            created_at: datetime_from_millis(self.created_at)?,
            last_used: self.last_used.map(datetime_from_millis).transpose()?,
        })
    }
}

/// Formats a calendar date the way it is stored.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a stored calendar date.
pub fn parse_date(s: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| StoreError::InvalidData(format!("invalid date {s:?}: {e}")))
}

/// Inserts a new license. Fails with a constraint violation if the key exists.
pub fn insert(conn: &Connection, new: &NewLicense<'_>) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO licenses (license_key, email, company_name, credits_total, credits_used, reset_date, active, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, 1, ?6)",
        params![
            new.key.as_str(),
            new.email,
            new.company,
            new.credits_total,
            format_date(new.reset_date),
            new.created_at.timestamp_millis(),
        ],
    )?;
    Ok(())
}

/// Loads a license regardless of its active flag.
pub fn get(conn: &Connection, key: &LicenseKey) -> StoreResult<Option<LicenseRecord>> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM licenses WHERE license_key = ?1"),
            params![key.as_str()],
            RawLicense::read,
        )
        .optional()?;
    raw.map(RawLicense::into_record).transpose()
}

/// Loads a license only if it is active.
pub fn get_active(conn: &Connection, key: &LicenseKey) -> StoreResult<Option<LicenseRecord>> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM licenses WHERE license_key = ?1 AND active = 1"),
            params![key.as_str()],
            RawLicense::read,
        )
        .optional()?;
    raw.map(RawLicense::into_record).transpose()
}

/// Lists every license, newest first.
pub fn list(conn: &Connection) -> StoreResult<Vec<LicenseRecord>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {COLUMNS} FROM licenses ORDER BY created_at DESC, id DESC"))?;
    let rows = stmt.query_map([], RawLicense::read)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row?.into_record()?);
    }
    Ok(result)
}

/// Sets the active flag. Returns false if the key does not exist.
pub fn set_active(conn: &Connection, key: &LicenseKey, active: bool) -> StoreResult<bool> {
    let changed = conn.execute(
        "UPDATE licenses SET active = ?2 WHERE license_key = ?1",
        params![key.as_str(), active],
    )?;
    Ok(changed > 0)
}

/// Zeroes `credits_used`. Returns false if the key does not exist.
pub fn reset_used(conn: &Connection, key: &LicenseKey) -> StoreResult<bool> {
    let changed = conn.execute(
        "UPDATE licenses SET credits_used = 0 WHERE license_key = ?1",
        params![key.as_str()],
    )?;
    Ok(changed > 0)
}

/// Adds one to `credits_used` without any bound check.
pub fn increment_used(conn: &Connection, key: &LicenseKey, now: DateTime<Utc>) -> StoreResult<bool> {
    let changed = conn.execute(
        "UPDATE licenses SET credits_used = credits_used + 1, last_used = ?2 WHERE license_key = ?1",
        params![key.as_str(), now.timestamp_millis()],
    )?;
    Ok(changed > 0)
}

/// Adds one to `credits_used` only if the license is active and has a
/// credit left. The check and the write are a single statement.
pub fn try_increment_used(
    conn: &Connection,
    key: &LicenseKey,
    now: DateTime<Utc>,
) -> StoreResult<bool> {
    let changed = conn.execute(
        "UPDATE licenses SET credits_used = credits_used + 1, last_used = ?2
         WHERE license_key = ?1 AND active = 1 AND credits_used < credits_total",
        params![key.as_str(), now.timestamp_millis()],
    )?;
    Ok(changed > 0)
}

/// Returns `(key, reset_date)` for every license due on or before `as_of`.
pub fn due_for_reset(conn: &Connection, as_of: NaiveDate) -> StoreResult<Vec<(LicenseKey, NaiveDate)>> {
    let mut stmt = conn.prepare(
        "SELECT license_key, reset_date FROM licenses WHERE reset_date <= ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![format_date(as_of)], |row| {
        let key: String = row.get(0)?;
        let date: String = row.get(1)?;
        Ok((key, date))
    })?;

    let mut result = Vec::new();
    for row in rows {
        let (key, date) = row?;
        result.push((LicenseKey::parse(&key)?, parse_date(&date)?));
    }
    Ok(result)
}

/// Zeroes usage and moves `reset_date` from `current` to `next`.
///
/// The update only applies while the stored date still equals `current`,
/// so two overlapping sweeps cannot advance a license twice.
pub fn advance_reset(
    conn: &Connection,
    key: &LicenseKey,
    current: NaiveDate,
    next: NaiveDate,
) -> StoreResult<bool> {
    let changed = conn.execute(
        "UPDATE licenses SET credits_used = 0, reset_date = ?3
         WHERE license_key = ?1 AND reset_date = ?2",
        params![key.as_str(), format_date(current), format_date(next)],
    )?;
    Ok(changed > 0)
}
