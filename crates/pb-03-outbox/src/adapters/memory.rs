//! # In-Memory Outbox Store
//!
//! Single-lock store for tests and single-node operation. Holding one lock
//! for the whole commit is what makes a batch atomic here.

use crate::domain::entry::{OutboxEntry, UnpublishedStats, WriteBatch};
use crate::domain::errors::StoreError;
use crate::ports::outbound::OutboxStore;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Default)]
struct Inner {
    state: HashMap<String, Value>,
    entries: BTreeMap<u64, OutboxEntry>,
    by_id: HashMap<String, u64>,
    pending: BTreeSet<u64>,
    next_seq: u64,
}

impl Inner {
    fn entry_mut(&mut self, id: &str) -> Result<&mut OutboxEntry, StoreError> {
        let seq = *self
            .by_id
            .get(id)
            .ok_or_else(|| StoreError::EntryNotFound(id.to_string()))?;
        self.entries
            .get_mut(&seq)
            .ok_or_else(|| StoreError::EntryNotFound(id.to_string()))
    }
}

#[derive(Default)]
pub struct InMemoryOutboxStore {
    inner: RwLock<Inner>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry, published or not, in commit order.
    pub fn entries(&self) -> Vec<OutboxEntry> {
        self.inner.read().entries.values().cloned().collect()
    }
}

impl OutboxStore for InMemoryOutboxStore {
    fn commit(&self, batch: WriteBatch) -> Result<Vec<OutboxEntry>, StoreError> {
        let (state, events) = batch.into_parts();
        let mut inner = self.inner.write();

        for write in state {
            inner.state.insert(write.key, write.value);
        }

        let mut committed = Vec::with_capacity(events.len());
        for event in events {
            inner.next_seq += 1;
            let seq = inner.next_seq;
            let entry = OutboxEntry::from_event(seq, event);
            inner.by_id.insert(entry.id.clone(), seq);
            inner.pending.insert(seq);
            inner.entries.insert(seq, entry.clone());
            committed.push(entry);
        }
        Ok(committed)
    }

    fn get_state(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.inner.read().state.get(key).cloned())
    }

    fn get_entry(&self, id: &str) -> Result<Option<OutboxEntry>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .by_id
            .get(id)
            .and_then(|seq| inner.entries.get(seq))
            .cloned())
    }

    fn fetch_unpublished(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .pending
            .iter()
            .take(limit)
            .filter_map(|seq| inner.entries.get(seq))
            .cloned()
            .collect())
    }

    fn mark_published(&self, id: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let entry = inner.entry_mut(id)?;
        if entry.published_at.is_some() {
            return Ok(false);
        }
        entry.published_at = Some(at);
        let seq = entry.seq;
        inner.pending.remove(&seq);
        Ok(true)
    }

    fn record_failure(&self, id: &str, error: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let entry = inner.entry_mut(id)?;
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        Ok(())
    }

    fn unpublished_stats(&self) -> Result<UnpublishedStats, StoreError> {
        let inner = self.inner.read();
        let oldest_created_at = inner
            .pending
            .iter()
            .next()
            .and_then(|seq| inner.entries.get(seq))
            .map(|e| e.created_at);
        Ok(UnpublishedStats {
            count: inner.pending.len() as u64,
            oldest_created_at,
        })
    }
}
