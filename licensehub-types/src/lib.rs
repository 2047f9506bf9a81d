//! Core type definitions for LicenseHub.
//!
//! This crate defines the plain data types shared by every layer of the
//! entitlement core:
//! - License keys and device fingerprints
//! - Persisted records (licenses, device bindings, usage events)
//! - An injectable wall clock
//!
//! Nothing in here touches storage; the records are what the store hands
//! back to the registry, binder, meter and limiter.

mod clock;
mod ids;
mod record;

pub use clock::{Clock, ManualClock, SystemClock, datetime_from_millis};
pub use ids::{Fingerprint, LicenseKey, MAX_FINGERPRINT_LEN};
pub use record::{DeviceBinding, LicenseInfo, LicenseRecord, LicenseSummary, UsageEvent};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when constructing core types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid license key: {0}")]
    InvalidLicenseKey(String),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
