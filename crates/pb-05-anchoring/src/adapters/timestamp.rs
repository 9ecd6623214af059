//! # Timestamp Authority
//!
//! Local Ed25519 timestamping. The node signs `timestamp:{hash}:{unix}` and
//! the hex signature becomes the handle. Anchors are confirmed as soon as
//! they exist and cost nothing.

use crate::domain::anchor::{normalize_hash, AnchorResult, AnchorState, AnchorStatus};
use crate::domain::errors::AnchorError;
use crate::ports::outbound::AnchorStrategy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_crypto::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use shared_types::CallContext;
use std::sync::Arc;
use tracing::debug;

pub const TIMESTAMP_NETWORK: &str = "timestamp";

/// Hex length of an Ed25519 signature.
const HANDLE_LEN: usize = 128;

pub struct TimestampStrategy {
    keypair: Arc<Ed25519KeyPair>,
}

fn statement(hash: &str, unix: i64) -> String {
    format!("timestamp:{hash}:{unix}")
}

impl TimestampStrategy {
    pub fn new(keypair: Arc<Ed25519KeyPair>) -> Self {
        Self { keypair }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }
}

#[async_trait]
impl AnchorStrategy for TimestampStrategy {
    fn network(&self) -> &str {
        TIMESTAMP_NETWORK
    }

    fn recognizes(&self, tx_handle: &str) -> bool {
        tx_handle.len() == HANDLE_LEN && tx_handle.bytes().all(|b| b.is_ascii_hexdigit())
    }

    async fn anchor(&self, ctx: &CallContext, hash: &str) -> Result<AnchorResult, AnchorError> {
        ctx.check()?;
        normalize_hash(hash)?;

        let now = Utc::now();
        let unix = now.timestamp();
        let signature = self.keypair.sign(statement(hash, unix).as_bytes());
        debug!(hash, unix, "Timestamp anchor signed");

        Ok(AnchorResult {
            tx_handle: signature.to_hex(),
            anchored_hash: hash.to_string(),
            network: TIMESTAMP_NETWORK.to_string(),
            cost: "0".to_string(),
            block_number: unix.max(0) as u64,
            timestamp: DateTime::from_timestamp(unix, 0).unwrap_or(now),
        })
    }

    async fn verify_anchor(
        &self,
        _ctx: &CallContext,
        result: &AnchorResult,
    ) -> Result<bool, AnchorError> {
        if result.network != TIMESTAMP_NETWORK {
            return Ok(false);
        }
        let unix = result.timestamp.timestamp();
        if unix < 0 || result.block_number != unix as u64 {
            return Ok(false);
        }
        let Ok(signature) = Ed25519Signature::from_hex(&result.tx_handle) else {
            return Ok(false);
        };
        let message = statement(&result.anchored_hash, unix);
        Ok(self
            .keypair
            .public_key()
            .verify(message.as_bytes(), &signature)
            .is_ok())
    }

    async fn get_status(
        &self,
        _ctx: &CallContext,
        tx_handle: &str,
    ) -> Result<AnchorStatus, AnchorError> {
        if !self.recognizes(tx_handle) {
            return Err(AnchorError::NotFound(tx_handle.to_string()));
        }
        Ok(AnchorStatus {
            tx_handle: tx_handle.to_string(),
            status: AnchorState::Confirmed,
            confirmations: 1,
            block_number: None,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::sha256_hex;

    fn strategy() -> TimestampStrategy {
        TimestampStrategy::new(Arc::new(Ed25519KeyPair::from_seed([7u8; 32])))
    }

    #[tokio::test]
    async fn test_anchor_and_verify() {
        let ts = strategy();
        let ctx = CallContext::background();
        let hash = sha256_hex(b"aggregate");

        let result = ts.anchor(&ctx, &hash).await.unwrap();
        assert_eq!(result.network, "timestamp");
        assert_eq!(result.cost, "0");
        assert_eq!(result.block_number, result.timestamp.timestamp() as u64);
        assert_eq!(result.tx_handle.len(), 128);
        assert!(ts.verify_anchor(&ctx, &result).await.unwrap());

        let status = ts.get_status(&ctx, &result.tx_handle).await.unwrap();
        assert_eq!(status.status, AnchorState::Confirmed);
    }

    #[tokio::test]
    async fn test_tampered_anchor_fails_verification() {
        let ts = strategy();
        let ctx = CallContext::background();
        let result = ts.anchor(&ctx, &sha256_hex(b"a")).await.unwrap();

        let mut other_hash = result.clone();
        other_hash.anchored_hash = sha256_hex(b"b");
        assert!(!ts.verify_anchor(&ctx, &other_hash).await.unwrap());

        let mut moved = result.clone();
        moved.timestamp += chrono::Duration::seconds(1);
        moved.block_number += 1;
        assert!(!ts.verify_anchor(&ctx, &moved).await.unwrap());

        let mut foreign = result;
        foreign.network = "ethereum".into();
        assert!(!ts.verify_anchor(&ctx, &foreign).await.unwrap());
    }

    #[tokio::test]
    async fn test_other_key_does_not_verify() {
        let ctx = CallContext::background();
        let result = strategy().anchor(&ctx, "abcd").await.unwrap();
        let stranger = TimestampStrategy::new(Arc::new(Ed25519KeyPair::from_seed([8u8; 32])));
        assert!(!stranger.verify_anchor(&ctx, &result).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let ts = strategy();
        let ctx = CallContext::background();
        assert!(matches!(
            ts.anchor(&ctx, "zz").await,
            Err(AnchorError::InvalidHash(_))
        ));
        assert!(matches!(
            ts.get_status(&ctx, "0x1234").await,
            Err(AnchorError::NotFound(_))
        ));

        ctx.cancel();
        assert!(matches!(
            ts.anchor(&ctx, "abcd").await,
            Err(AnchorError::Cancelled(_))
        ));
    }
}
