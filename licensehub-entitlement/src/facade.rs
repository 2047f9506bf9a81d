//! The entitlement facade.
//!
//! Every request walks the same pipeline:
//!
//! ```text
//! LICENSE_CHECK -> DEVICE_CHECK -> CREDIT_CHECK -> RATE_CHECK -> PERFORM -> COMMIT
//! ```
//!
//! Any check may reject with a [`LicenseError`] whose `reason()` names the
//! failed step. Non-metered requests stop after the device check. Credits,
//! rate samples and usage events are written only at COMMIT.

use crate::config::LicenseHubConfig;
use crate::locks::KeyLocks;
use chrono::NaiveDate;
use licensehub_db::{Store, devices, licenses, rate_limits, usage};
use licensehub_license::{
    Admission, CreditMeter, DeviceBinder, KeyDeriver, KeySecret, LicenseError, LicenseRegistry,
    LicenseResult, RateLimiter,
};
use licensehub_types::{
    Clock, Fingerprint, LicenseInfo, LicenseKey, LicenseRecord, LicenseSummary, SystemClock,
    UsageEvent,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Action label appended on every successful authentication.
pub const LOGIN_ACTION: &str = "LOGIN";

/// Prefix of the usage event appended when a gated action fails.
pub const FAILED_ACTION_PREFIX: &str = "FAILED:";

/// Number of usage events returned by [`Entitlements::get_info`].
pub const RECENT_USAGE_LIMIT: usize = 10;

/// What the guarded commit did to the credit balance.
enum Charge {
    Charged,
    Exhausted,
    Inactive,
}

/// Entry point for transports and admin tooling.
#[derive(Debug)]
pub struct Entitlements {
    store: Store,
    clock: Arc<dyn Clock>,
    registry: LicenseRegistry,
    binder: DeviceBinder,
    meter: CreditMeter,
    limiter: RateLimiter,
    locks: KeyLocks,
    perform_timeout: Duration,
    default_credits: u32,
    default_duration_months: u32,
}

impl Entitlements {
    /// Wires the core to an already opened store.
    pub fn new(
        store: Store,
        secret: &KeySecret,
        clock: Arc<dyn Clock>,
        config: &LicenseHubConfig,
    ) -> LicenseResult<Self> {
        config
            .validate()
            .map_err(|e| LicenseError::InvalidInput(e.to_string()))?;
        let policy = config
            .rate_limit_policy()
            .map_err(|e| LicenseError::InvalidInput(e.to_string()))?;
        let deriver = KeyDeriver::new(secret)?;

        Ok(Self {
            registry: LicenseRegistry::new(store.clone(), deriver, Arc::clone(&clock)),
            binder: DeviceBinder::with_max_devices(
                store.clone(),
                Arc::clone(&clock),
                config.max_devices,
            ),
            meter: CreditMeter::new(store.clone(), Arc::clone(&clock)),
            limiter: RateLimiter::with_policy(store.clone(), Arc::clone(&clock), policy),
            locks: KeyLocks::default(),
            perform_timeout: config.perform_timeout(),
            default_credits: config.default_credits,
            default_duration_months: config.default_duration_months,
            store,
            clock,
        })
    }

    /// Opens the configured database and wires the core against the system clock.
    pub fn open(config: &LicenseHubConfig) -> LicenseResult<Self> {
        let store = Store::open(&config.database_path)?;
        Self::new(store, &config.key_secret(), Arc::new(SystemClock), config)
    }

    /// Today's date according to the injected clock.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // ── Request paths ──────────────────────────────────────────────

    /// Validates a key (and device, if given) and records a `LOGIN` event.
    pub fn authenticate(
        &self,
        key: &str,
        fingerprint: Option<&str>,
        origin: Option<&str>,
    ) -> LicenseResult<LicenseSummary> {
        let key = parse_key(key)?;
        let fingerprint = parse_fingerprint(fingerprint)?;
        let record = self
            .check(&key, fingerprint.as_ref(), false)
            .inspect_err(|e| log_rejection(&key, e))?;

        self.append_event(&key, fingerprint.as_ref(), origin, LOGIN_ACTION)?;
        info!(license_key = %key, "License authenticated");
        Ok(LicenseSummary::from(&record))
    }

    /// Runs the checks for one request without performing or committing it.
    pub fn authorize(
        &self,
        key: &str,
        fingerprint: Option<&str>,
        is_metered: bool,
    ) -> LicenseResult<LicenseRecord> {
        let key = parse_key(key)?;
        let fingerprint = parse_fingerprint(fingerprint)?;
        self.check(&key, fingerprint.as_ref(), is_metered)
            .inspect_err(|e| log_rejection(&key, e))
    }

    /// Records a performed metered action: one credit, one rate sample and
    /// one usage event, written together.
    ///
    /// No bound check is made here; pair it with [`authorize`](Self::authorize).
    /// Unknown and deactivated keys are both `NotFound` and nothing is written.
    pub fn commit(
        &self,
        key: &str,
        fingerprint: Option<&str>,
        origin: Option<&str>,
        action_label: &str,
    ) -> LicenseResult<()> {
        let key = parse_key(key)?;
        let fingerprint = parse_fingerprint(fingerprint)?;
        let event = self.event(&key, fingerprint.as_ref(), origin, action_label);

        let committed = self.store.with_tx(|tx| {
            if licenses::get_active(tx, &key)?.is_none() {
                return Ok(false);
            }
            licenses::increment_used(tx, &key, event.timestamp)?;
            rate_limits::insert(tx, &key, event.timestamp)?;
            usage::append(tx, &event)?;
            Ok(true)
        })?;
        if !committed {
            return Err(LicenseError::NotFound);
        }

        debug!(license_key = %key, action = action_label, "Metered action committed");
        Ok(())
    }

    /// Runs the full metered pipeline around `action`.
    ///
    /// The credit check, the rate check, the action and the commit all run
    /// under a lock held for this license, so concurrent calls for the same
    /// key cannot both spend its last credit or its last rate slot. The
    /// action is bounded by the configured timeout. A failed or timed-out
    /// action spends nothing and leaves a `FAILED:<label>` usage event.
    pub async fn perform_metered<F, Fut, T, E>(
        &self,
        key: &str,
        fingerprint: Option<&str>,
        origin: Option<&str>,
        action_label: &str,
        action: F,
    ) -> LicenseResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let key = parse_key(key)?;
        let fingerprint = parse_fingerprint(fingerprint)?;
        let _guard = self.locks.acquire(&key).await;

        self.check(&key, fingerprint.as_ref(), true)
            .inspect_err(|e| log_rejection(&key, e))?;

        match timeout(self.perform_timeout, action()).await {
            Ok(Ok(value)) => {
                self.commit_guarded(&key, fingerprint.as_ref(), origin, action_label)?;
                Ok(value)
            }
            Ok(Err(e)) => {
                warn!(license_key = %key, action = action_label, error = %e, "Gated action failed");
                self.record_failure(&key, fingerprint.as_ref(), origin, action_label)?;
                Err(LicenseError::ActionFailed(e.to_string()))
            }
            Err(_) => {
                warn!(
                    license_key = %key,
                    action = action_label,
                    timeout = ?self.perform_timeout,
                    "Gated action timed out"
                );
                self.record_failure(&key, fingerprint.as_ref(), origin, action_label)?;
                Err(LicenseError::ActionTimedOut(self.perform_timeout))
            }
        }
    }

    /// License record, bound devices, recent usage and remaining credits.
    pub fn get_info(&self, key: &str) -> LicenseResult<LicenseInfo> {
        let key = parse_key(key)?;
        let info = self.store.with_conn(|conn| {
            let Some(license) = licenses::get_active(conn, &key)? else {
                return Ok(None);
            };
            Ok(Some(LicenseInfo {
                credits_remaining: license.credits_remaining(),
                devices: devices::list(conn, &key)?,
                recent_usage: usage::recent(conn, &key, RECENT_USAGE_LIMIT)?,
                license,
            }))
        })?;
        info.ok_or(LicenseError::NotFound)
    }

    // ── Administration ─────────────────────────────────────────────

    /// Issues a license, using the configured defaults for omitted values.
    pub fn create_license(
        &self,
        email: &str,
        company: Option<&str>,
        credits: Option<u32>,
        duration_months: Option<u32>,
    ) -> LicenseResult<LicenseRecord> {
        self.registry.create(
            email,
            company,
            credits.unwrap_or(self.default_credits),
            duration_months.unwrap_or(self.default_duration_months),
        )
    }

    pub fn deactivate_license(&self, key: &str) -> LicenseResult<()> {
        self.registry.deactivate(&parse_key(key)?)
    }

    pub fn reactivate_license(&self, key: &str) -> LicenseResult<()> {
        self.registry.reactivate(&parse_key(key)?)
    }

    pub fn reset_credits(&self, key: &str) -> LicenseResult<()> {
        self.registry.reset_credits(&parse_key(key)?)
    }

    /// Unbinds every device. Unknown keys are reported as `NotFound`.
    pub fn reset_devices(&self, key: &str) -> LicenseResult<usize> {
        let key = parse_key(key)?;
        self.registry.get(&key)?;
        self.binder.reset(&key)
    }

    /// Every license, newest first, regardless of the active flag.
    pub fn list_licenses(&self) -> LicenseResult<Vec<LicenseRecord>> {
        self.registry.list()
    }

    pub fn run_monthly_reset(&self, as_of: NaiveDate) -> LicenseResult<usize> {
        self.registry.bulk_monthly_reset(as_of)
    }

    pub fn prune_rate_samples(&self) -> LicenseResult<usize> {
        self.limiter.prune()
    }

    // ── Internals ──────────────────────────────────────────────────

    fn check(
        &self,
        key: &LicenseKey,
        fingerprint: Option<&Fingerprint>,
        is_metered: bool,
    ) -> LicenseResult<LicenseRecord> {
        let record = self.registry.lookup_active(key)?;

        if let Some(fingerprint) = fingerprint {
            if self.binder.admit(key, fingerprint)? == Admission::Denied {
                return Err(LicenseError::DeviceLimitExceeded(self.binder.max_devices()));
            }
        }

        if is_metered {
            if !self.meter.has_credits(key)? {
                return Err(LicenseError::NoCreditsRemaining);
            }
            if self.limiter.admit(key)? == Admission::Denied {
                return Err(LicenseError::RateLimitExceeded(
                    self.limiter.policy().max_requests,
                ));
            }
        }

        Ok(record)
    }

    /// Commit used by the composed flow: the credit is taken only if one is
    /// still available. A license deactivated while the action ran gets
    /// nothing written and reports `NotFound`.
    fn commit_guarded(
        &self,
        key: &LicenseKey,
        fingerprint: Option<&Fingerprint>,
        origin: Option<&str>,
        action_label: &str,
    ) -> LicenseResult<()> {
        let event = self.event(key, fingerprint, origin, action_label);
        let outcome = self.store.with_tx(|tx| {
            if licenses::get_active(tx, key)?.is_none() {
                return Ok(Charge::Inactive);
            }
            let charged = licenses::try_increment_used(tx, key, event.timestamp)?;
            rate_limits::insert(tx, key, event.timestamp)?;
            usage::append(tx, &event)?;
            Ok(if charged { Charge::Charged } else { Charge::Exhausted })
        })?;

        match outcome {
            Charge::Charged => {
                debug!(license_key = %key, action = action_label, "Metered action committed");
                Ok(())
            }
            Charge::Exhausted => {
                warn!(
                    license_key = %key,
                    action = action_label,
                    "Allotment exhausted by a concurrent commit; action recorded without a charge"
                );
                Ok(())
            }
            Charge::Inactive => {
                warn!(
                    license_key = %key,
                    action = action_label,
                    "License deactivated while the action ran; nothing recorded"
                );
                Err(LicenseError::NotFound)
            }
        }
    }

    fn record_failure(
        &self,
        key: &LicenseKey,
        fingerprint: Option<&Fingerprint>,
        origin: Option<&str>,
        action_label: &str,
    ) -> LicenseResult<()> {
        self.append_event(
            key,
            fingerprint,
            origin,
            &format!("{FAILED_ACTION_PREFIX}{action_label}"),
        )
    }

    fn append_event(
        &self,
        key: &LicenseKey,
        fingerprint: Option<&Fingerprint>,
        origin: Option<&str>,
        action: &str,
    ) -> LicenseResult<()> {
        let event = self.event(key, fingerprint, origin, action);
        Ok(self.store.with_conn(|conn| usage::append(conn, &event))?)
    }

    fn event(
        &self,
        key: &LicenseKey,
        fingerprint: Option<&Fingerprint>,
        origin: Option<&str>,
        action: &str,
    ) -> UsageEvent {
        UsageEvent {
            license_key: key.clone(),
            fingerprint: fingerprint.cloned(),
            origin: origin.map(str::to_string),
            action: action.to_string(),
            timestamp: self.clock.now(),
        }
    }
}

/// Malformed keys are indistinguishable from unknown ones.
fn parse_key(raw: &str) -> LicenseResult<LicenseKey> {
    LicenseKey::parse(raw).map_err(|_| LicenseError::NotFound)
}

/// A blank fingerprint means none was supplied.
fn parse_fingerprint(raw: Option<&str>) -> LicenseResult<Option<Fingerprint>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Fingerprint::new(s)
            .map(Some)
            .map_err(|e| LicenseError::InvalidInput(e.to_string())),
        None => Ok(None),
    }
}

fn log_rejection(key: &LicenseKey, err: &LicenseError) {
    if err.is_transient() {
        warn!(license_key = %key, error = %err, "Request failed");
    } else {
        info!(license_key = %key, reason = err.reason(), "Request rejected");
    }
}
