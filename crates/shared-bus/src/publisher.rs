//! # Message Publisher
//!
//! Defines the publishing side of the bus.

use crate::messages::{BusMessage, TopicFilter};
use crate::subscriber::{MessageStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Errors from publishing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The bus could not accept the message right now.
    #[error("Bus unavailable: {0}")]
    Unavailable(String),

    /// The bus has been shut down.
    #[error("Bus closed")]
    Closed,
}

/// Port for handing messages to a message broker.
///
/// An `Ok` return means the broker accepted the message; the outbox marks an
/// entry published only after that.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a message to its topic.
    async fn publish(&self, message: BusMessage) -> Result<(), BusError>;
}

/// In-memory bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
/// Suitable for single-node operation; deployments with an external broker
/// provide their own `MessageBus`.
pub struct InMemoryBus {
    sender: broadcast::Sender<BusMessage>,

    /// Total messages accepted.
    published: AtomicU64,

    capacity: usize,
}

impl InMemoryBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to messages matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: TopicFilter) -> Subscription {
        debug!(topics = ?filter.topics, "New bus subscription");
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Stream of messages matching a filter.
    #[must_use]
    pub fn stream(&self, filter: TopicFilter) -> MessageStream {
        MessageStream::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, message: BusMessage) -> Result<(), BusError> {
        let topic = message.topic.clone();
        let key = message.key.clone();
        self.published.fetch_add(1, Ordering::Relaxed);

        // A send with no live receivers is still an accepted publish: the
        // in-memory bus keeps no backlog for future subscribers.
        let receivers = self.sender.send(message).unwrap_or(0);
        debug!(topic = %topic, key = %key, receivers, "Message published");
        Ok(())
    }
}
