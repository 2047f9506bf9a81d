//! SQLite persistence for LicenseHub.
//!
//! The [`Store`] owns the only connection to the database and is the single
//! shared mutable resource of the entitlement core. It is constructed
//! explicitly and cloned into each component; clones share the connection.
//!
//! # Units of work
//!
//! - [`Store::with_conn`] runs a closure against the connection while holding
//!   the store lock.
//! - [`Store::with_tx`] additionally wraps the closure in an `IMMEDIATE`
//!   transaction that commits on `Ok` and rolls back on `Err` or panic.
//!
//! Because the lock is held for the whole closure, every unit of work is
//! atomic with respect to every other caller in the process.
//!
//! # Tables
//!
//! Statement helpers for each table live in [`licenses`], [`devices`],
//! [`usage`] and [`rate_limits`]. They take a plain `&Connection` so they
//! compose freely inside one transaction.

mod error;
pub mod devices;
pub mod licenses;
pub mod rate_limits;
mod schema;
pub mod usage;

pub use error::{StoreError, StoreResult};
pub use schema::{current_version, latest_version};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

/// How long a writer waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Opens (or creates) a store at the given path and migrates it.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Failed to open license store");
            StoreError::Unavailable(format!("failed to open {}: {e}", path.display()))
        })?;
        let journal: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        info!(path = %path.display(), journal = %journal, "Opened license store");
        Self::init(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(mut conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Runs `f` inside an immediate transaction.
    ///
    /// The transaction is committed only if `f` returns `Ok`.
    pub fn with_tx<T>(&self, f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>) -> StoreResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Returns the schema version of the open database.
    pub fn schema_version(&self) -> StoreResult<u32> {
        self.with_conn(current_version)
    }
}
