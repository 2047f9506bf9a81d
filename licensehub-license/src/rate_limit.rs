//! Sliding-window rate limiting.
//!
//! A request is admitted while fewer than `max_requests` samples fall in the
//! window ending now. Only performed actions are recorded, so a denied
//! attempt never extends its own lockout.

use crate::Admission;
use crate::error::LicenseResult;
use chrono::Duration;
use licensehub_db::{Store, rate_limits};
use licensehub_types::{Clock, LicenseKey};
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of metered requests per window.
pub const DEFAULT_MAX_PER_HOUR: u32 = 15;

/// Limit and window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_PER_HOUR,
            window: Duration::hours(1),
        }
    }
}

/// Per-license request throttle backed by stored samples.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Store,
    clock: Arc<dyn Clock>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self::with_policy(store, clock, RateLimitPolicy::default())
    }

    pub fn with_policy(store: Store, clock: Arc<dyn Clock>, policy: RateLimitPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Checks the configured limit.
    pub fn admit(&self, key: &LicenseKey) -> LicenseResult<Admission> {
        self.admit_with_limit(key, self.policy.max_requests)
    }

    /// Checks an explicit limit against the configured window.
    pub fn admit_with_limit(&self, key: &LicenseKey, max_requests: u32) -> LicenseResult<Admission> {
        let count = self.in_window(key)?;
        if count >= max_requests {
            info!(license_key = %key, count, max_requests, "Rate limit reached");
            return Ok(Admission::Denied);
        }
        Ok(Admission::Admitted)
    }

    /// Number of samples currently inside the window.
    pub fn in_window(&self, key: &LicenseKey) -> LicenseResult<u32> {
        let since = self.clock.now() - self.policy.window;
        Ok(self
            .store
            .with_conn(|conn| rate_limits::count_since(conn, key, since))?)
    }

    /// Appends a sample stamped now.
    pub fn record(&self, key: &LicenseKey) -> LicenseResult<()> {
        let now = self.clock.now();
        self.store
            .with_conn(|conn| rate_limits::insert(conn, key, now))?;
        debug!(license_key = %key, "Rate sample recorded");
        Ok(())
    }

    /// Deletes samples that can no longer affect any admission decision.
    pub fn prune(&self) -> LicenseResult<usize> {
        let cutoff = self.clock.now() - self.policy.window;
        let removed = self
            .store
            .with_conn(|conn| rate_limits::prune_before(conn, cutoff))?;
        if removed > 0 {
            info!(removed, "Pruned expired rate samples");
        }
        Ok(removed)
    }
}
