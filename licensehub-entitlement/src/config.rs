//! Service configuration read from `licensehub.toml`.
//!
//! Every field has a default, so an absent file or a file that sets only a
//! few keys is valid. The HMAC secret may also come from the
//! `LICENSEHUB_SECRET` environment variable, which wins over the file.

use chrono::TimeDelta;
use licensehub_license::{
    DEFAULT_MAX_DEVICES, DEFAULT_MAX_PER_HOUR, KeySecret, RateLimitPolicy, SECRET_ENV_VAR,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Longest accepted rate-limit window.
const MAX_RATE_WINDOW_SECS: u64 = 31 * 24 * 60 * 60;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Runtime settings for the entitlement core and the housekeeping daemon.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseHubConfig {
    pub database_path: PathBuf,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub max_devices: u32,
    pub max_requests_per_hour: u32,
    pub rate_window_secs: u64,
    pub default_credits: u32,
    pub default_duration_months: u32,
    pub perform_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for LicenseHubConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("licensehub.db"),
            secret: None,
            max_devices: DEFAULT_MAX_DEVICES,
            max_requests_per_hour: DEFAULT_MAX_PER_HOUR,
            rate_window_secs: 3600,
            default_credits: 50,
            default_duration_months: 1,
            perform_timeout_secs: 10,
            sweep_interval_secs: 3600,
        }
    }
}

impl std::fmt::Debug for LicenseHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseHubConfig")
            .field("database_path", &self.database_path)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("max_devices", &self.max_devices)
            .field("max_requests_per_hour", &self.max_requests_per_hour)
            .field("rate_window_secs", &self.rate_window_secs)
            .field("default_credits", &self.default_credits)
            .field("default_duration_months", &self.default_duration_months)
            .field("perform_timeout_secs", &self.perform_timeout_secs)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .finish()
    }
}

impl LicenseHubConfig {
    /// Loads configuration from `path`, falling back to defaults if the file
    /// is missing or unusable.
    pub fn load_from(path: &Path) -> Self {
        match Self::try_load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{e}. Falling back to default configuration.");
                Self::default()
            }
        }
    }

    /// Strict variant of [`load_from`](Self::load_from): a missing file still
    /// yields defaults, but read, parse and validation failures are errors.
    pub fn try_load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            info!("No config file found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the core cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_duration_months == 0 {
            return Err(ConfigError::Invalid(
                "default_duration_months must be at least 1".to_string(),
            ));
        }
        if self.rate_window_secs == 0 || self.rate_window_secs > MAX_RATE_WINDOW_SECS {
            return Err(ConfigError::Invalid(format!(
                "rate_window_secs must be between 1 and {MAX_RATE_WINDOW_SECS}"
            )));
        }
        if self.perform_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "perform_timeout_secs must be positive".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Replaces the file secret with `LICENSEHUB_SECRET` when it is set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var(SECRET_ENV_VAR) {
            if !secret.is_empty() {
                self.secret = Some(secret);
            }
        }
    }

    /// The configured secret, or the development secret if none is set.
    pub fn key_secret(&self) -> KeySecret {
        match self.secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => KeySecret::new(secret).unwrap_or_else(|_| KeySecret::development()),
            None => KeySecret::development(),
        }
    }

    pub fn rate_limit_policy(&self) -> ConfigResult<RateLimitPolicy> {
        let secs = i64::try_from(self.rate_window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| ConfigError::Invalid("rate_window_secs out of range".to_string()))?;
        Ok(RateLimitPolicy {
            max_requests: self.max_requests_per_hour,
            window: secs,
        })
    }

    pub fn perform_timeout(&self) -> Duration {
        Duration::from_secs(self.perform_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
