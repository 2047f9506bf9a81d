//! Shared helpers for facade tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use licensehub_db::Store;
use licensehub_entitlement::{Entitlements, LicenseHubConfig};
use licensehub_license::KeySecret;
use licensehub_types::{Clock, ManualClock};
use std::sync::Arc;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
}

pub fn config() -> LicenseHubConfig {
    LicenseHubConfig {
        secret: Some("test-secret".to_string()),
        ..LicenseHubConfig::default()
    }
}

pub struct Harness {
    pub hub: Arc<Entitlements>,
    pub clock: ManualClock,
    pub store: Store,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: LicenseHubConfig) -> Self {
        let store = Store::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let secret = KeySecret::new("test-secret").unwrap();
        let hub = Entitlements::new(store.clone(), &secret, shared, &config).unwrap();
        Self {
            hub: Arc::new(hub),
            clock,
            store,
        }
    }

    /// Issues a license and returns its key as a string.
    pub fn license(&self, email: &str, credits: u32) -> String {
        self.hub
            .create_license(email, None, Some(credits), None)
            .unwrap()
            .key
            .to_string()
    }

    pub fn actions(&self, key: &str) -> Vec<String> {
        self.hub
            .get_info(key)
            .unwrap()
            .recent_usage
            .into_iter()
            .map(|e| e.action)
            .collect()
    }
}
