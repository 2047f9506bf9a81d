//! Device binding.
//!
//! Each license may be bound to at most `max_devices` distinct client
//! fingerprints. A fingerprint that is already bound is always admitted and
//! never counts against the cap a second time.
//!
//! The lookup, count and insert for one admission run inside a single
//! immediate transaction, so two concurrent first-time devices can never
//! both observe a free slot.

use crate::Admission;
use crate::error::{LicenseError, LicenseResult};
use licensehub_db::{Store, devices, licenses};
use licensehub_types::{Clock, DeviceBinding, Fingerprint, LicenseKey};
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of devices per license.
pub const DEFAULT_MAX_DEVICES: u32 = 3;

enum Outcome {
    Recognized,
    Registered,
    Full,
    NoLicense,
}

/// Enforces the per-license device cap.
#[derive(Debug, Clone)]
pub struct DeviceBinder {
    store: Store,
    clock: Arc<dyn Clock>,
    max_devices: u32,
}

impl DeviceBinder {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self::with_max_devices(store, clock, DEFAULT_MAX_DEVICES)
    }

    pub fn with_max_devices(store: Store, clock: Arc<dyn Clock>, max_devices: u32) -> Self {
        Self {
            store,
            clock,
            max_devices,
        }
    }

    /// The configured cap.
    #[must_use]
    pub fn max_devices(&self) -> u32 {
        self.max_devices
    }

    /// Admits `fingerprint` under the configured cap.
    pub fn admit(&self, key: &LicenseKey, fingerprint: &Fingerprint) -> LicenseResult<Admission> {
        self.admit_with_limit(key, fingerprint, self.max_devices)
    }

    /// Admits `fingerprint` under an explicit cap.
    ///
    /// Returns [`LicenseError::NotFound`] if the key has no license row.
    pub fn admit_with_limit(
        &self,
        key: &LicenseKey,
        fingerprint: &Fingerprint,
        max_devices: u32,
    ) -> LicenseResult<Admission> {
        let now = self.clock.now();
        let outcome = self.store.with_tx(|tx| {
            if devices::touch(tx, key, fingerprint, now)? {
                return Ok(Outcome::Recognized);
            }
            if licenses::get(tx, key)?.is_none() {
                return Ok(Outcome::NoLicense);
            }
            if devices::count(tx, key)? >= max_devices {
                return Ok(Outcome::Full);
            }
            devices::insert(tx, key, fingerprint, now)?;
            Ok(Outcome::Registered)
        })?;

        match outcome {
            Outcome::Recognized => {
                debug!(license_key = %key, "Known device admitted");
                Ok(Admission::Admitted)
            }
            Outcome::Registered => {
                info!(license_key = %key, fingerprint = %fingerprint, "New device registered");
                Ok(Admission::Admitted)
            }
            Outcome::Full => {
                info!(license_key = %key, max_devices, "Device limit reached");
                Ok(Admission::Denied)
            }
            Outcome::NoLicense => Err(LicenseError::NotFound),
        }
    }

    /// Removes every binding for a license. Returns the number removed.
    pub fn reset(&self, key: &LicenseKey) -> LicenseResult<usize> {
        let removed = self.store.with_conn(|conn| devices::delete_all(conn, key))?;
        info!(license_key = %key, removed, "Device bindings reset");
        Ok(removed)
    }

    /// Lists current bindings in registration order.
    pub fn list(&self, key: &LicenseKey) -> LicenseResult<Vec<DeviceBinding>> {
        Ok(self.store.with_conn(|conn| devices::list(conn, key))?)
    }

    /// Number of bound devices.
    pub fn count(&self, key: &LicenseKey) -> LicenseResult<u32> {
        Ok(self.store.with_conn(|conn| devices::count(conn, key))?)
    }
}
