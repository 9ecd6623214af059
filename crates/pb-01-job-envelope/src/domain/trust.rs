//! # Submitter Trust Policy
//!
//! Optional allowlist of base64 submitter public keys. An empty allowlist
//! trusts any key that produces a valid signature.

use shared_crypto::Ed25519PublicKey;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct TrustPolicy {
    allowed: HashSet<String>,
}

impl TrustPolicy {
    /// Trust every correctly signed spec.
    #[must_use]
    pub fn allow_any() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn allowlist<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: keys
                .into_iter()
                .map(Into::into)
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated key list, as found in configuration.
    #[must_use]
    pub fn from_csv(csv: &str) -> Self {
        Self::allowlist(csv.split(','))
    }

    #[must_use]
    pub fn is_trusted(&self, key: &Ed25519PublicKey) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&key.to_base64())
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.allowed.is_empty()
    }
}
