//! # Inbound Ports (Driving Ports / API)

use crate::domain::anchor::{AnchorResult, AnchorStatus};
use crate::domain::errors::AnchorError;
use async_trait::async_trait;
use shared_types::CallContext;

/// Anchoring API exposed to the rest of the node.
#[async_trait]
pub trait AnchorApi: Send + Sync {
    async fn anchor_hash(&self, ctx: &CallContext, hash: &str) -> Result<AnchorResult, AnchorError>;

    async fn verify_anchor(
        &self,
        ctx: &CallContext,
        result: &AnchorResult,
    ) -> Result<bool, AnchorError>;

    async fn get_anchor_status(
        &self,
        ctx: &CallContext,
        tx_handle: &str,
    ) -> Result<AnchorStatus, AnchorError>;
}
