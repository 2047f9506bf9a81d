//! Error types for the licensing module.

use licensehub_db::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Licensing-specific errors.
///
/// Unknown and deactivated keys both surface as [`LicenseError::NotFound`];
/// callers cannot tell them apart.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// A license was already issued for this email.
    #[error("a license already exists for this email")]
    DuplicateLicense,

    /// Unknown, malformed or inactive license key.
    #[error("invalid or inactive license")]
    NotFound,

    /// Device limit exceeded.
    #[error("device limit exceeded (max {0} devices)")]
    DeviceLimitExceeded(u32),

    /// No credits left in the current period.
    #[error("no credits remaining")]
    NoCreditsRemaining,

    /// Too many metered requests inside the rolling window.
    #[error("rate limit exceeded (max {0} requests per window)")]
    RateLimitExceeded(u32),

    /// Transport or storage failure.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The gated action itself failed.
    #[error("action failed: {0}")]
    ActionFailed(String),

    /// The gated action did not finish in time.
    #[error("action timed out after {0:?}")]
    ActionTimedOut(Duration),

    /// Caller-supplied input was rejected before touching the store.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl LicenseError {
    /// Machine-readable rejection reason.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::DuplicateLicense => "duplicate_license",
            Self::NotFound => "invalid_or_inactive",
            Self::DeviceLimitExceeded(_) => "device_limit",
            Self::NoCreditsRemaining => "no_credits",
            Self::RateLimitExceeded(_) => "rate_limited",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::ActionFailed(_) => "action_failed",
            Self::ActionTimedOut(_) => "action_timeout",
            Self::InvalidInput(_) => "invalid_input",
        }
    }

    /// Human-readable hint suitable for showing to an end user.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::DeviceLimitExceeded(max) => Some(format!(
                "Maximum {max} devices allowed per license. Contact support to reset."
            )),
            Self::RateLimitExceeded(max) => Some(format!(
                "Maximum {max} requests per hour. Please try again later."
            )),
            Self::NoCreditsRemaining => {
                Some("Credits reset at the start of the next billing period.".to_string())
            }
            Self::StoreUnavailable(_) => Some("Temporary failure, please retry.".to_string()),
            _ => None,
        }
    }

    /// Only storage failures are worth a bounded retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for LicenseError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
