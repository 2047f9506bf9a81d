//! Credit metering.
//!
//! `has_credits` followed by `consume` is check-then-act: two concurrent
//! callers can both pass the check and overshoot the allotment. Callers that
//! need a hard bound use [`CreditMeter::try_consume`], which checks and
//! increments in one statement.

use crate::error::{LicenseError, LicenseResult};
use licensehub_db::{Store, licenses};
use licensehub_types::{Clock, LicenseKey};
use std::sync::Arc;
use tracing::debug;

/// Tracks and consumes the per-period credit balance.
#[derive(Debug, Clone)]
pub struct CreditMeter {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl CreditMeter {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// True iff the license is active and has at least one credit left.
    /// Unknown and inactive keys report false.
    pub fn has_credits(&self, key: &LicenseKey) -> LicenseResult<bool> {
        let record = self.store.with_conn(|conn| licenses::get_active(conn, key))?;
        Ok(record.is_some_and(|r| r.has_credits()))
    }

    /// Credits left for an active license. May be zero or negative.
    pub fn remaining(&self, key: &LicenseKey) -> LicenseResult<i64> {
        self.store
            .with_conn(|conn| licenses::get_active(conn, key))?
            .map(|r| r.credits_remaining())
            .ok_or(LicenseError::NotFound)
    }

    /// Spends one credit and stamps `last_used`. No bound check.
    pub fn consume(&self, key: &LicenseKey) -> LicenseResult<()> {
        let now = self.clock.now();
        if !self
            .store
            .with_conn(|conn| licenses::increment_used(conn, key, now))?
        {
            return Err(LicenseError::NotFound);
        }
        debug!(license_key = %key, "Credit consumed");
        Ok(())
    }

    /// Spends one credit only if one is available. Returns whether it did.
    pub fn try_consume(&self, key: &LicenseKey) -> LicenseResult<bool> {
        let now = self.clock.now();
        let consumed = self
            .store
            .with_conn(|conn| licenses::try_increment_used(conn, key, now))?;
        debug!(license_key = %key, consumed, "Conditional credit consumption");
        Ok(consumed)
    }
}
