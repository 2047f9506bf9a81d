//! Licensing rules for LicenseHub.
//!
//! This crate handles:
//! - License key derivation from account emails (HMAC-SHA256)
//! - The license registry (issue, look up, activate, reset)
//! - Device binding with a per-license cap
//! - Credit metering against a monthly allotment
//! - Sliding-window rate limiting
//!
//! # Design Principles
//!
//! - **Store-backed**: every component reads and writes through one
//!   explicitly constructed [`licensehub_db::Store`]; nothing is cached
//!   beyond a single call
//! - **Indistinguishable misses**: unknown and deactivated keys both report
//!   [`LicenseError::NotFound`]
//! - **Injectable time**: components take a [`licensehub_types::Clock`]
//!
//! # License Key Format
//!
//! Keys are formatted as four groups of four upper-case hex digits:
//! `XXXX-XXXX-XXXX-XXXX`.

mod credits;
mod device;
mod error;
mod key;
mod rate_limit;
mod registry;

pub use credits::CreditMeter;
pub use device::{DEFAULT_MAX_DEVICES, DeviceBinder};
pub use error::{LicenseError, LicenseResult};
pub use key::{DEVELOPMENT_SECRET, KeyDeriver, KeySecret, SECRET_ENV_VAR, normalize_email};
pub use rate_limit::{DEFAULT_MAX_PER_HOUR, RateLimitPolicy, RateLimiter};
pub use registry::LicenseRegistry;

/// Outcome of a device or rate-limit admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Denied,
}

impl Admission {
    #[must_use]
    pub fn is_admitted(self) -> bool {
        matches!(self, Self::Admitted)
    }
}
