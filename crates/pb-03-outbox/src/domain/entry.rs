//! # Outbox Records
//!
//! A [`WriteBatch`] groups state writes with the events that announce them.
//! Stores apply a batch atomically and turn each [`OutboxEvent`] into an
//! [`OutboxEntry`] with a commit-order sequence number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::errors::StoreError;

/// A keyed state write.
#[derive(Debug, Clone, PartialEq)]
pub struct StateWrite {
    pub key: String,
    pub value: Value,
}

/// An event waiting to be committed alongside its state change.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEvent {
    /// Stable id; becomes the bus message key.
    pub id: String,
    pub topic: String,
    pub payload: Value,
    /// Correlation id of the request that caused the change.
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// State writes and outbox events that commit together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    state: Vec<StateWrite>,
    events: Vec<OutboxEvent>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a state write under `key`.
    pub fn put_state<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<&mut Self, StoreError> {
        self.state.push(StateWrite {
            key: key.into(),
            value: serde_json::to_value(value)?,
        });
        Ok(self)
    }

    /// Stage an event on `topic`. Returns the event id.
    pub fn enqueue<T: Serialize>(&mut self, topic: impl Into<String>, data: &T) -> Result<String, StoreError> {
        self.enqueue_correlated(topic, data, None)
    }

    /// Stage an event carrying the originating request's correlation id.
    pub fn enqueue_correlated<T: Serialize>(
        &mut self,
        topic: impl Into<String>,
        data: &T,
        request_id: Option<String>,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.events.push(OutboxEvent {
            id: id.clone(),
            topic: topic.into(),
            payload: serde_json::to_value(data)?,
            request_id,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    pub fn state_writes(&self) -> &[StateWrite] {
        &self.state
    }

    pub fn events(&self) -> &[OutboxEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty() && self.events.is_empty()
    }

    pub fn into_parts(self) -> (Vec<StateWrite>, Vec<OutboxEvent>) {
        (self.state, self.events)
    }
}

/// A committed outbox row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Commit order; scans return entries in ascending `seq`.
    pub seq: u64,
    pub id: String,
    pub topic: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, by the publisher.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Failed publish attempts so far.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl OutboxEntry {
    pub fn from_event(seq: u64, event: OutboxEvent) -> Self {
        Self {
            seq,
            id: event.id,
            topic: event.topic,
            payload: event.payload,
            request_id: event.request_id,
            created_at: event.created_at,
            published_at: None,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    /// Wire form for delivery attempt number `attempt`.
    pub fn envelope(&self, attempt: u32) -> OutboxEnvelope {
        OutboxEnvelope {
            id: self.id.clone(),
            topic: self.topic.clone(),
            enqueued_at: self.created_at,
            attempt,
            request_id: self.request_id.clone(),
            data: self.payload.clone(),
        }
    }
}

/// What goes on the bus. `id` is stable across redeliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEnvelope {
    pub id: String,
    pub topic: String,
    pub enqueued_at: DateTime<Utc>,
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub data: Value,
}

/// Backlog health signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpublishedStats {
    pub count: u64,
    pub oldest_created_at: Option<DateTime<Utc>>,
}
