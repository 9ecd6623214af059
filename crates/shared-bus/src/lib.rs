//! # Shared Bus - Message Bus Port
//!
//! The hand-off point between the outbox publisher and whatever consumes
//! announced state changes.
//!
//! ```text
//! ┌──────────────┐   publish(topic, key, payload)   ┌──────────────┐
//! │   Outbox     │ ───────────────────────────────▶ │  MessageBus  │
//! │  Publisher   │                                  │              │
//! └──────────────┘                                  └──────┬───────┘
//!                                                          │ subscribe()
//!                                                          ▼
//!                                                  ┌──────────────┐
//!                                                  │  Consumers   │
//!                                                  │ (idempotent) │
//!                                                  └──────────────┘
//! ```
//!
//! ## Delivery
//!
//! Delivery is at-least-once. Every [`BusMessage`] carries a `key` (the
//! outbox entry id) and consumers drop repeats with [`IdempotentConsumer`].

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod dedupe;
pub mod messages;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use dedupe::IdempotentConsumer;
pub use messages::{BusMessage, TopicFilter};
pub use publisher::{BusError, InMemoryBus, MessageBus};
pub use subscriber::{MessageStream, Subscription, SubscriptionError};

/// Maximum messages buffered per subscriber before it lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }
}
