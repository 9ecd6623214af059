//! # Inbound Ports (Driving Ports / API)

use crate::domain::demand::{ExecOutcome, ExecutionHandle};
use crate::domain::errors::NegotiationError;
use async_trait::async_trait;
use shared_types::{CallContext, JobSpec};

/// Per-region negotiation API.
#[async_trait]
pub trait NegotiationApi: Send + Sync {
    /// Negotiate `spec` in `region` until a provider activity exists.
    async fn negotiate(
        &self,
        ctx: &CallContext,
        spec: &JobSpec,
        region: &str,
    ) -> Result<ExecutionHandle, NegotiationError>;

    /// Run the job's command batch on a negotiated activity.
    async fn execute(
        &self,
        ctx: &CallContext,
        handle: &ExecutionHandle,
        spec: &JobSpec,
    ) -> Result<ExecOutcome, NegotiationError>;
}
