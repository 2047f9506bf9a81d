//! Shared test helpers for license tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use licensehub_db::Store;
use licensehub_license::{
    CreditMeter, DeviceBinder, KeyDeriver, KeySecret, LicenseRegistry, RateLimitPolicy, RateLimiter,
};
use licensehub_types::{Clock, Fingerprint, LicenseKey, ManualClock};
use std::sync::Arc;

pub const TEST_SECRET: &str = "test-secret";

/// Fixed starting instant for every test clock.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
}

pub fn deriver() -> KeyDeriver {
    KeyDeriver::new(&KeySecret::new(TEST_SECRET).unwrap()).unwrap()
}

pub fn fp(s: &str) -> Fingerprint {
    Fingerprint::new(s).unwrap()
}

/// All components wired to one in-memory store and one manual clock.
pub struct Fixture {
    pub store: Store,
    pub clock: ManualClock,
    pub registry: LicenseRegistry,
    pub binder: DeviceBinder,
    pub meter: CreditMeter,
    pub limiter: RateLimiter,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_store(Store::open_in_memory().unwrap())
    }

    pub fn with_store(store: Store) -> Self {
        let clock = ManualClock::new(start());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        Self {
            registry: LicenseRegistry::new(store.clone(), deriver(), Arc::clone(&shared)),
            binder: DeviceBinder::new(store.clone(), Arc::clone(&shared)),
            meter: CreditMeter::new(store.clone(), Arc::clone(&shared)),
            limiter: RateLimiter::with_policy(
                store.clone(),
                shared,
                RateLimitPolicy::default(),
            ),
            store,
            clock,
        }
    }

    /// Issues a license and returns its key.
    pub fn license(&self, email: &str, credits: u32) -> LicenseKey {
        self.registry.create(email, None, credits, 1).unwrap().key
    }
}
