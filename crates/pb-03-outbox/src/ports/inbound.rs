//! # Inbound Ports (Driving Ports / API)

use crate::domain::entry::UnpublishedStats;
use crate::domain::errors::PublishError;
use crate::service::ScanReport;
use async_trait::async_trait;

/// Outbox publisher API.
#[async_trait]
pub trait OutboxPublisherApi: Send + Sync {
    /// Publish one batch of unpublished entries.
    async fn scan_once(&self) -> Result<ScanReport, PublishError>;

    /// Current backlog.
    fn unpublished_stats(&self) -> Result<UnpublishedStats, PublishError>;
}
