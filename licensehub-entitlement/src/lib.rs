//! Entitlement facade for LicenseHub.
//!
//! [`Entitlements`] composes the license registry, device binder, credit
//! meter and rate limiter into the request pipeline that transports call,
//! plus the administrative operations used by operator tooling.
//! [`LicenseHubConfig`] carries the tunables for both.

mod config;
mod facade;
mod locks;

pub use config::{ConfigError, ConfigResult, LicenseHubConfig};
pub use facade::{Entitlements, FAILED_ACTION_PREFIX, LOGIN_ACTION, RECENT_USAGE_LIMIT};
pub use licensehub_license::{LicenseError, LicenseResult};
