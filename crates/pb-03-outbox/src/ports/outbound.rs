//! # Outbound Ports (Driven Ports / SPI)
//!
//! The storage the outbox needs. Implementations must apply a
//! [`WriteBatch`] atomically: the state writes and the outbox rows become
//! visible together or not at all.

use crate::domain::entry::{OutboxEntry, UnpublishedStats, WriteBatch};
use crate::domain::errors::StoreError;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub trait OutboxStore: Send + Sync {
    /// Apply `batch` in one transaction. Returns the committed entries in
    /// sequence order.
    fn commit(&self, batch: WriteBatch) -> Result<Vec<OutboxEntry>, StoreError>;

    /// Point read of a state row.
    fn get_state(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn get_entry(&self, id: &str) -> Result<Option<OutboxEntry>, StoreError>;

    /// Up to `limit` entries with no `published_at`, oldest first.
    fn fetch_unpublished(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError>;

    /// Set `published_at` if it is unset. Returns false when the entry was
    /// already published; the original timestamp is kept.
    fn mark_published(&self, id: &str, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Record a failed publish attempt.
    fn record_failure(&self, id: &str, error: &str) -> Result<(), StoreError>;

    fn unpublished_stats(&self) -> Result<UnpublishedStats, StoreError>;
}
