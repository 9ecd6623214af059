//! # Outbound Ports (Driven Ports / SPI)
//!
//! What the negotiator needs from a marketplace. Every call takes the
//! caller's context; implementations retry transport failures internally
//! and stop as soon as the context ends.

use crate::domain::demand::{DemandEvent, DemandSpec, ExecOutcome, ProbeResult};
use crate::domain::errors::ClientError;
use async_trait::async_trait;
use serde_json::Value;
use shared_types::CallContext;

#[async_trait]
pub trait ProviderNetwork: Send + Sync {
    /// Discover the marketplace mount point.
    async fn probe(&self, ctx: &CallContext) -> Result<ProbeResult, ClientError>;

    /// Post a demand; returns the marketplace-assigned id.
    async fn create_demand(
        &self,
        ctx: &CallContext,
        demand: &DemandSpec,
    ) -> Result<String, ClientError>;

    /// Fetch pending events for a demand. An empty list means nothing yet.
    async fn demand_events(
        &self,
        ctx: &CallContext,
        demand_id: &str,
    ) -> Result<Vec<DemandEvent>, ClientError>;

    /// Accept a proposal; returns the agreement id.
    async fn create_agreement(
        &self,
        ctx: &CallContext,
        proposal_id: &str,
    ) -> Result<String, ClientError>;

    /// Start an activity under an agreement; returns the activity id.
    async fn create_activity(
        &self,
        ctx: &CallContext,
        agreement_id: &str,
    ) -> Result<String, ClientError>;

    /// Run an exe-script on an activity and wait for the batch to finish.
    async fn exec(
        &self,
        ctx: &CallContext,
        activity_id: &str,
        script: &Value,
    ) -> Result<ExecOutcome, ClientError>;
}
