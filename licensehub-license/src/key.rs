//! License key derivation.
//!
//! A license key is `HMAC-SHA256(secret, normalize(email))`, truncated to
//! its first 8 bytes and rendered as `XXXX-XXXX-XXXX-XXXX`.
//!
//! The same email always yields the same key, which is what lets the
//! registry reject a second license for an address without a separate
//! email index.
//!
//! # Collisions
//!
//! Truncation to 64 bits is the dominant accepted risk of this scheme. By
//! the birthday bound, a collision becomes likely only after roughly 2^32
//! (about four billion) issued licenses; a collision surfaces as a
//! `DuplicateLicense` for the second address, never as a shared license.
//!
//! # Secret handling
//!
//! The secret is operator configuration. [`KeySecret::development`] exists
//! for local use only and logs a warning whenever it is selected.

use crate::error::{LicenseError, LicenseResult};
use hmac::{Hmac, Mac};
use licensehub_types::LicenseKey;
use sha2::Sha256;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Secret used when no operator secret is configured. Never use in production.
pub const DEVELOPMENT_SECRET: &str = "licensehub-development-secret-change-me";

/// Environment variable that overrides the configured key secret.
pub const SECRET_ENV_VAR: &str = "LICENSEHUB_SECRET";

/// The process-wide HMAC secret, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeySecret {
    bytes: Vec<u8>,
}

impl KeySecret {
    /// Wraps an operator-supplied secret.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidInput`] for an empty secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> LicenseResult<Self> {
        let bytes = secret.into();
        if bytes.is_empty() {
            return Err(LicenseError::InvalidInput("key secret is empty".to_string()));
        }
        Ok(Self { bytes })
    }

    /// The built-in non-production secret.
    #[must_use]
    pub fn development() -> Self {
        warn!("Deriving license keys with the built-in development secret; set {SECRET_ENV_VAR} in production");
        Self {
            bytes: DEVELOPMENT_SECRET.as_bytes().to_vec(),
        }
    }

    /// Returns true if this is the built-in development secret.
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.bytes == DEVELOPMENT_SECRET.as_bytes()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for KeySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySecret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Lower-cases and trims an email before it is hashed.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Derives license keys from account emails.
///
/// Holds an HMAC state already keyed with the secret; each derivation
/// clones it, so the raw secret is only touched once.
#[derive(Clone)]
pub struct KeyDeriver {
    mac: HmacSha256,
}

impl KeyDeriver {
    /// Keys a deriver with the given secret.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidInput`] if the MAC rejects the key.
    pub fn new(secret: &KeySecret) -> LicenseResult<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| LicenseError::InvalidInput(format!("unusable key secret: {e}")))?;
        Ok(Self { mac })
    }

    /// Derives the license key for an email.
    #[must_use]
    pub fn derive(&self, email: &str) -> LicenseKey {
        let mut mac = self.mac.clone();
        mac.update(normalize_email(email).as_bytes());
        let digest = mac.finalize().into_bytes();

        let mut truncated = [0u8; 8];
        truncated.copy_from_slice(&digest[..8]);
        LicenseKey::from_bytes(&truncated)
    }
}

impl std::fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDeriver").finish_non_exhaustive()
    }
}
