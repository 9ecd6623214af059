//! # Anchor Service
//!
//! Front door for the node. Holds one strategy (possibly a composite) and
//! adds confirmation polling on top.

use crate::adapters::composite::CompositeStrategy;
use crate::adapters::ledger::LedgerStrategy;
use crate::adapters::timestamp::TimestampStrategy;
use crate::domain::anchor::{AnchorResult, AnchorState, AnchorStatus};
use crate::domain::config::{AnchorConfig, StrategyKind};
use crate::domain::errors::AnchorError;
use crate::ports::inbound::AnchorApi;
use crate::ports::outbound::AnchorStrategy;
use async_trait::async_trait;
use shared_crypto::Ed25519KeyPair;
use shared_types::CallContext;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Build the configured backend set. `multi` prefers the timestamp
/// authority and falls back to the ledger.
pub fn build_strategy(
    config: &AnchorConfig,
    keypair: Arc<Ed25519KeyPair>,
) -> Result<Arc<dyn AnchorStrategy>, AnchorError> {
    let strategy: Arc<dyn AnchorStrategy> = match config.strategy {
        StrategyKind::Timestamp => Arc::new(TimestampStrategy::new(keypair)),
        StrategyKind::Ledger => Arc::new(LedgerStrategy::new(config.ledger.clone())?),
        StrategyKind::Multi => Arc::new(CompositeStrategy::new(vec![
            Arc::new(TimestampStrategy::new(keypair)),
            Arc::new(LedgerStrategy::new(config.ledger.clone())?),
        ])),
    };
    Ok(strategy)
}

pub struct AnchorService {
    strategy: Arc<dyn AnchorStrategy>,
}

impl AnchorService {
    pub fn new(strategy: Arc<dyn AnchorStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &Arc<dyn AnchorStrategy> {
        &self.strategy
    }

    /// Poll until the anchor reaches a terminal state.
    ///
    /// `Failed` on chain is an error. Running out of `timeout` gives
    /// `ConfirmationTimeout`; the caller's own cancellation is passed through.
    pub async fn wait_for_confirmation(
        &self,
        ctx: &CallContext,
        tx_handle: &str,
        poll: Duration,
        timeout: Duration,
    ) -> Result<AnchorStatus, AnchorError> {
        let waiting = ctx.child_with_timeout(timeout);
        let timed_out = || AnchorError::ConfirmationTimeout {
            tx_handle: tx_handle.to_string(),
            waited: timeout,
        };

        loop {
            let status = match self.strategy.get_status(&waiting, tx_handle).await {
                Ok(status) => status,
                Err(AnchorError::Cancelled(reason)) => {
                    ctx.check()?;
                    debug!(tx_handle, %reason, "Confirmation wait ended during status call");
                    return Err(timed_out());
                }
                Err(e) => return Err(e),
            };

            match status.status {
                AnchorState::Confirmed => return Ok(status),
                AnchorState::Failed => return Err(AnchorError::Failed(tx_handle.to_string())),
                AnchorState::Pending => {
                    debug!(tx_handle, confirmations = status.confirmations, "Anchor pending");
                }
            }

            if waiting.sleep(poll).await.is_err() {
                ctx.check()?;
                return Err(timed_out());
            }
        }
    }
}

#[async_trait]
impl AnchorApi for AnchorService {
    async fn anchor_hash(&self, ctx: &CallContext, hash: &str) -> Result<AnchorResult, AnchorError> {
        let result = self.strategy.anchor(ctx, hash).await?;
        info!(
            network = %result.network,
            tx_handle = %result.tx_handle,
            hash,
            "Anchor created"
        );
        Ok(result)
    }

    async fn verify_anchor(
        &self,
        ctx: &CallContext,
        result: &AnchorResult,
    ) -> Result<bool, AnchorError> {
        self.strategy.verify_anchor(ctx, result).await
    }

    async fn get_anchor_status(
        &self,
        ctx: &CallContext,
        tx_handle: &str,
    ) -> Result<AnchorStatus, AnchorError> {
        self.strategy.get_status(ctx, tx_handle).await
    }
}
