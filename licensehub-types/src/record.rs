//! Persisted records.
//!
//! These mirror the four tables owned by the store. Usage events are
//! append-only; license rows are mutated by the registry and the credit
//! meter but never deleted.

use crate::{Fingerprint, LicenseKey};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One paying account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub key: LicenseKey,
    pub email: String,
    pub company: Option<String>,
    pub credits_total: i64,
    /// Not capped at `credits_total`; see [`LicenseRecord::credits_remaining`].
    pub credits_used: i64,
    pub reset_date: NaiveDate,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

impl LicenseRecord {
    /// Credits left in the current period. May be zero or negative.
    #[must_use]
    pub fn credits_remaining(&self) -> i64 {
        self.credits_total - self.credits_used
    }

    /// Returns true if at least one credit is left.
    #[must_use]
    pub fn has_credits(&self) -> bool {
        self.credits_remaining() > 0
    }
}

/// A device fingerprint bound to a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBinding {
    pub license_key: LicenseKey,
    pub fingerprint: Fingerprint,
    pub registered_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// An immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub license_key: LicenseKey,
    pub fingerprint: Option<Fingerprint>,
    /// Client address as reported by the transport layer.
    pub origin: Option<String>,
    /// Free-form tag such as `LOGIN` or `GENERATE:<id>`.
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// What a successful authentication hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseSummary {
    pub email: String,
    pub company: Option<String>,
    pub credits_total: i64,
    pub credits_used: i64,
    pub credits_remaining: i64,
    pub reset_date: NaiveDate,
}

impl From<&LicenseRecord> for LicenseSummary {
    fn from(record: &LicenseRecord) -> Self {
        Self {
            email: record.email.clone(),
            company: record.company.clone(),
            credits_total: record.credits_total,
            credits_used: record.credits_used,
            credits_remaining: record.credits_remaining(),
            reset_date: record.reset_date,
        }
    }
}

/// Full license detail: the record, its devices and recent activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseInfo {
    #[serde(flatten)]
    pub license: LicenseRecord,
    pub credits_remaining: i64,
    pub devices: Vec<DeviceBinding>,
    /// Newest first.
    pub recent_usage: Vec<UsageEvent>,
}
