//! # Outbound Ports (Driven Ports / SPI)

use crate::domain::anchor::{AnchorResult, AnchorStatus};
use crate::domain::errors::AnchorError;
use async_trait::async_trait;
use shared_types::CallContext;

/// One anchoring backend.
///
/// Implementations hold no mutable state between calls.
#[async_trait]
pub trait AnchorStrategy: Send + Sync {
    /// Tag stamped on every result this backend produces.
    fn network(&self) -> &str;

    /// Whether `tx_handle` has the shape of a handle this backend issues.
    fn recognizes(&self, tx_handle: &str) -> bool;

    async fn anchor(&self, ctx: &CallContext, hash: &str) -> Result<AnchorResult, AnchorError>;

    /// `Ok(false)` for a result that does not check out, including one
    /// produced by another network.
    async fn verify_anchor(
        &self,
        ctx: &CallContext,
        result: &AnchorResult,
    ) -> Result<bool, AnchorError>;

    async fn get_status(
        &self,
        ctx: &CallContext,
        tx_handle: &str,
    ) -> Result<AnchorStatus, AnchorError>;
}
