//! # Composite Strategy
//!
//! An ordered list of backends behind the same [`AnchorStrategy`] surface.
//! `anchor` falls through the list; `verify_anchor` and `get_status` go to
//! the single backend that owns the result.

use crate::domain::anchor::{AnchorResult, AnchorStatus};
use crate::domain::errors::AnchorError;
use crate::ports::outbound::AnchorStrategy;
use async_trait::async_trait;
use shared_types::CallContext;
use std::sync::Arc;
use tracing::{info, warn};

pub const COMPOSITE_NETWORK: &str = "multi";

pub struct CompositeStrategy {
    backends: Vec<Arc<dyn AnchorStrategy>>,
}

impl CompositeStrategy {
    /// Backends in preference order.
    pub fn new(backends: Vec<Arc<dyn AnchorStrategy>>) -> Self {
        Self { backends }
    }

    pub fn networks(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.network()).collect()
    }

    fn by_network(&self, network: &str) -> Option<&Arc<dyn AnchorStrategy>> {
        self.backends.iter().find(|b| b.network() == network)
    }

    fn by_handle(&self, tx_handle: &str) -> Option<&Arc<dyn AnchorStrategy>> {
        self.backends.iter().find(|b| b.recognizes(tx_handle))
    }
}

#[async_trait]
impl AnchorStrategy for CompositeStrategy {
    fn network(&self) -> &str {
        COMPOSITE_NETWORK
    }

    fn recognizes(&self, tx_handle: &str) -> bool {
        self.by_handle(tx_handle).is_some()
    }

    async fn anchor(&self, ctx: &CallContext, hash: &str) -> Result<AnchorResult, AnchorError> {
        if self.backends.is_empty() {
            return Err(AnchorError::NoBackends);
        }

        let mut failures = Vec::new();
        for backend in &self.backends {
            ctx.check()?;
            match backend.anchor(ctx, hash).await {
                Ok(result) => {
                    if !failures.is_empty() {
                        info!(
                            network = backend.network(),
                            skipped = failures.len(),
                            "Anchored on fallback backend"
                        );
                    }
                    return Ok(result);
                }
                Err(e) => {
                    warn!(network = backend.network(), error = %e, "Anchoring backend failed, trying next");
                    failures.push((backend.network().to_string(), e));
                }
            }
        }
        Err(AnchorError::AllFailed(failures))
    }

    async fn verify_anchor(
        &self,
        ctx: &CallContext,
        result: &AnchorResult,
    ) -> Result<bool, AnchorError> {
        match self.by_network(&result.network) {
            Some(backend) => backend.verify_anchor(ctx, result).await,
            None => Err(AnchorError::NotFound(result.tx_handle.clone())),
        }
    }

    async fn get_status(
        &self,
        ctx: &CallContext,
        tx_handle: &str,
    ) -> Result<AnchorStatus, AnchorError> {
        match self.by_handle(tx_handle) {
            Some(backend) => backend.get_status(ctx, tx_handle).await,
            None => Err(AnchorError::NotFound(tx_handle.to_string())),
        }
    }
}
