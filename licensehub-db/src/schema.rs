//! Schema creation and migrations.
//!
//! Each entry in [`MIGRATIONS`] moves the database from `user_version = i`
//! to `i + 1`. Migrations run inside a single transaction on open.

use crate::error::{StoreError, StoreResult};
use rusqlite::Connection;
use tracing::{debug, info};

/// Ordered list of schema migrations.
const MIGRATIONS: &[&str] = &[
    // 1: the four core tables
    "
    CREATE TABLE IF NOT EXISTS licenses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        license_key TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        company_name TEXT,
        credits_total INTEGER NOT NULL DEFAULT 50 CHECK (credits_total >= 0),
        credits_used INTEGER NOT NULL DEFAULT 0 CHECK (credits_used >= 0),
        reset_date TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL,
        last_used INTEGER
    );

    CREATE TABLE IF NOT EXISTS devices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        license_key TEXT NOT NULL REFERENCES licenses(license_key),
        fingerprint TEXT NOT NULL,
        registered_at INTEGER NOT NULL,
        last_seen INTEGER,
        UNIQUE(license_key, fingerprint)
    );

    CREATE TABLE IF NOT EXISTS usage_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        license_key TEXT NOT NULL REFERENCES licenses(license_key),
        fingerprint TEXT,
        ip_address TEXT,
        action TEXT NOT NULL,
        timestamp INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS rate_limits (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        license_key TEXT NOT NULL REFERENCES licenses(license_key),
        timestamp INTEGER NOT NULL
    );
    ",
    // 2: lookup indexes for the per-key hot paths
    "
    CREATE INDEX IF NOT EXISTS idx_usage_log_key_ts ON usage_log(license_key, timestamp);
    CREATE INDEX IF NOT EXISTS idx_rate_limits_key_ts ON rate_limits(license_key, timestamp);
    CREATE INDEX IF NOT EXISTS idx_licenses_reset_date ON licenses(reset_date);
    ",
];

/// The schema version a fully migrated database reports.
#[must_use]
pub fn latest_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Reads `PRAGMA user_version`.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Applies every pending migration.
pub(crate) fn migrate(conn: &mut Connection) -> StoreResult<()> {
    let from = current_version(conn)?;
    let to = latest_version();
    if from > to {
        return Err(StoreError::Migration(format!(
            "database schema version {from} is newer than supported version {to}"
        )));
    }
    if from == to {
        debug!(version = from, "Schema up to date");
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (idx, sql) in MIGRATIONS.iter().enumerate().skip(from as usize) {
        tx.execute_batch(sql)
            .map_err(|e| StoreError::Migration(format!("migration {} failed: {e}", idx + 1)))?;
    }
    tx.pragma_update(None, "user_version", to)?;
    tx.commit()?;

    info!(from, to, "Applied schema migrations");
    Ok(())
}
