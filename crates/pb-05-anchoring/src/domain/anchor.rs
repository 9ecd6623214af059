//! # Anchors
//!
//! An [`AnchorResult`] is produced by exactly one backend and never changes
//! afterwards. An [`AnchorStatus`] is polled until it reaches a terminal
//! state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::AnchorError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorResult {
    /// Backend-specific handle: a signature for the timestamp authority, a
    /// transaction hash for the ledger.
    pub tx_handle: String,
    pub anchored_hash: String,
    /// Tag of the backend that produced this result.
    pub network: String,
    pub cost: String,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorState {
    Pending,
    Confirmed,
    Failed,
}

impl AnchorState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AnchorState::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorStatus {
    pub tx_handle: String,
    pub status: AnchorState,
    pub confirmations: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// Accept a hex digest, with or without `0x`. Returns it without the prefix.
pub fn normalize_hash(hash: &str) -> Result<&str, AnchorError> {
    let digits = hash.strip_prefix("0x").unwrap_or(hash);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AnchorError::InvalidHash(hash.to_string()));
    }
    Ok(digits)
}
