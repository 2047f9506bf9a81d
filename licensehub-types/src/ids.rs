//! Identifier types used throughout the entitlement core.
//!
//! License keys are four hyphen-separated groups of four upper-case hex
//! digits (`XXXX-XXXX-XXXX-XXXX`). Fingerprints are opaque client strings.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of bytes of digest material encoded in a license key.
const KEY_BYTES: usize = 8;

/// Longest fingerprint accepted from a client.
pub const MAX_FINGERPRINT_LEN: usize = 256;

/// A formatted license key.
///
/// Construction always goes through [`LicenseKey::parse`] or
/// [`LicenseKey::from_bytes`], so a value of this type is known to be
/// well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicenseKey(String);

impl LicenseKey {
    /// Formats eight bytes as `XXXX-XXXX-XXXX-XXXX`.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; KEY_BYTES]) -> Self {
        let mut out = String::with_capacity(19);
        for (i, pair) in bytes.chunks(2).enumerate() {
            if i > 0 {
                out.push('-');
            }
            for b in pair {
                out.push_str(&format!("{b:02X}"));
            }
        }
        Self(out)
    }

    /// Parses a key typed by a user.
    ///
    /// Surrounding whitespace is ignored and lower-case hex is accepted.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let normalized = s.trim().to_ascii_uppercase();
        let groups: Vec<&str> = normalized.split('-').collect();
        if groups.len() != 4 {
            return Err(Error::InvalidLicenseKey(
                "expected four groups separated by '-'".to_string(),
            ));
        }
        for group in &groups {
            if group.len() != 4 || !group.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::InvalidLicenseKey(format!(
                    "group {group:?} is not four hex digits"
                )));
            }
        }
        Ok(Self(normalized))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LicenseKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LicenseKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LicenseKey> for String {
    fn from(key: LicenseKey) -> Self {
        key.0
    }
}

/// An opaque, stable identifier for a client device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps a client-supplied fingerprint.
    ///
    /// Empty (or all-whitespace) and oversized values are rejected.
    pub fn new(raw: impl Into<String>) -> Result<Self, Error> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidFingerprint("fingerprint is empty".to_string()));
        }
        if trimmed.len() > MAX_FINGERPRINT_LEN {
            return Err(Error::InvalidFingerprint(format!(
                "fingerprint longer than {MAX_FINGERPRINT_LEN} bytes"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}
