//! License registry: issuing, looking up and administering licenses.

use crate::error::{LicenseError, LicenseResult};
use crate::key::KeyDeriver;
use chrono::{Days, Months, NaiveDate};
use licensehub_db::Store;
use licensehub_db::licenses::{self, NewLicense};
use licensehub_types::{Clock, LicenseKey, LicenseRecord};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Days added per purchased month when computing the first reset date.
const DAYS_PER_DURATION_MONTH: u64 = 30;

/// CRUD and lifecycle operations on license records.
#[derive(Debug, Clone)]
pub struct LicenseRegistry {
    store: Store,
    deriver: KeyDeriver,
    clock: Arc<dyn Clock>,
}

impl LicenseRegistry {
    pub fn new(store: Store, deriver: KeyDeriver, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            deriver,
            clock,
        }
    }

    /// Returns the key that `email` would be issued.
    #[must_use]
    pub fn derive_key(&self, email: &str) -> LicenseKey {
        self.deriver.derive(email)
    }

    /// Issues a new license.
    ///
    /// The first reset date is `today + 30 × duration_months` days. A second
    /// call for the same email fails with [`LicenseError::DuplicateLicense`]
    /// and leaves the existing record untouched.
    pub fn create(
        &self,
        email: &str,
        company: Option<&str>,
        credits: u32,
        duration_months: u32,
    ) -> LicenseResult<LicenseRecord> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(LicenseError::InvalidInput(format!("invalid email {email:?}")));
        }
        if duration_months == 0 {
            return Err(LicenseError::InvalidInput(
                "duration must be at least one month".to_string(),
            ));
        }

        let key = self.deriver.derive(email);
        let now = self.clock.now();
        let reset_date = now
            .date_naive()
            .checked_add_days(Days::new(DAYS_PER_DURATION_MONTH * u64::from(duration_months)))
            .ok_or_else(|| LicenseError::InvalidInput("duration out of range".to_string()))?;
        let company = company.map(str::trim).filter(|c| !c.is_empty());

        let new = NewLicense {
            key: &key,
            email,
            company,
            credits_total: i64::from(credits),
            reset_date,
            created_at: now,
        };

        let inserted = self.store.with_tx(|tx| {
            licenses::insert(tx, &new)?;
            licenses::get(tx, &key)
        });

        match inserted {
            Ok(Some(record)) => {
                info!(license_key = %key, credits, %reset_date, "License created");
                Ok(record)
            }
            Ok(None) => Err(LicenseError::StoreUnavailable(
                "license vanished after insert".to_string(),
            )),
            Err(e) if e.is_constraint_violation() => {
                debug!(license_key = %key, "License already issued for email");
                Err(LicenseError::DuplicateLicense)
            }
            Err(e) => {
                warn!(error = %e, "Failed to create license");
                Err(e.into())
            }
        }
    }

    /// Returns the record only if the key exists and is active.
    pub fn lookup_active(&self, key: &LicenseKey) -> LicenseResult<LicenseRecord> {
        self.store
            .with_conn(|conn| licenses::get_active(conn, key))?
            .ok_or(LicenseError::NotFound)
    }

    /// Administrative lookup that ignores the active flag.
    pub fn get(&self, key: &LicenseKey) -> LicenseResult<LicenseRecord> {
        self.store
            .with_conn(|conn| licenses::get(conn, key))?
            .ok_or(LicenseError::NotFound)
    }

    /// Lists every license, newest first.
    pub fn list(&self) -> LicenseResult<Vec<LicenseRecord>> {
        Ok(self.store.with_conn(licenses::list)?)
    }

    /// Marks a license inactive. Idempotent.
    pub fn deactivate(&self, key: &LicenseKey) -> LicenseResult<()> {
        self.set_active(key, false)
    }

    /// Marks a license active again. Idempotent.
    pub fn reactivate(&self, key: &LicenseKey) -> LicenseResult<()> {
        self.set_active(key, true)
    }

    fn set_active(&self, key: &LicenseKey, active: bool) -> LicenseResult<()> {
        if !self
            .store
            .with_conn(|conn| licenses::set_active(conn, key, active))?
        {
            return Err(LicenseError::NotFound);
        }
        info!(license_key = %key, active, "License active flag set");
        Ok(())
    }

    /// Zeroes the credits used in the current period.
    pub fn reset_credits(&self, key: &LicenseKey) -> LicenseResult<()> {
        if !self.store.with_conn(|conn| licenses::reset_used(conn, key))? {
            return Err(LicenseError::NotFound);
        }
        info!(license_key = %key, "Credits reset");
        Ok(())
    }

    /// Resets every license whose period has elapsed as of `as_of`.
    ///
    /// Each due license has `credits_used` zeroed and its reset date moved
    /// forward by exactly one calendar month (clamped to the end of shorter
    /// months). A license whose reset date is already in the future is left
    /// alone, so running this twice on the same day is harmless.
    ///
    /// The next date is computed from the stored reset date, not the day the
    /// license was issued, so a clamped day of month is not restored later:
    /// Jan 31 advances to Feb 28 and then to Mar 28. This drift toward the
    /// 28th is accepted; periods stay one calendar month long.
    ///
    /// Only one period is advanced per call: a license that is two periods
    /// overdue stays due after the first call. Run the sweep at least daily.
    pub fn bulk_monthly_reset(&self, as_of: NaiveDate) -> LicenseResult<usize> {
        let affected = self.store.with_tx(|tx| {
            let mut affected = 0;
            for (key, current) in licenses::due_for_reset(tx, as_of)? {
                let Some(next) = current.checked_add_months(Months::new(1)) else {
                    warn!(license_key = %key, %current, "Reset date cannot be advanced");
                    continue;
                };
                if licenses::advance_reset(tx, &key, current, next)? {
                    debug!(license_key = %key, %current, %next, "Monthly reset applied");
                    affected += 1;
                }
            }
            Ok(affected)
        })?;

        info!(%as_of, affected, "Monthly credit reset complete");
        Ok(affected)
    }
}
