//! Fingerprint derivation.
//!
//! A fingerprint is the canonical index key built from a property name and
//! value: `name + ":" + value`, both lower-cased first. Derivation is pure
//! and backend-independent, so every backend variant observes identical keys
//! for identical inputs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical index key for one (property name, property value) pair.
///
/// Two properties with equal normalized name and value always produce the
/// same fingerprint. Entity ids are NOT part of the fingerprint; they are
/// the values stored under it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive the fingerprint for a property.
    ///
    /// Name and value are case-normalized before the key is built, so
    /// `("Num", "6.13")` and `("num", "6.13")` index identically.
    pub fn derive(name: &str, value: &str) -> Self {
        Fingerprint(format!(
            "{}:{}",
            name.to_lowercase(),
            value.to_lowercase()
        ))
    }

    /// Wrap an already-canonical key, as found in a snapshot.
    ///
    /// Snapshots carry fingerprints that were normalized when first derived;
    /// import must preserve them byte-for-byte rather than re-normalize.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Fingerprint(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> String {
        fp.0
    }
}
