//! # Hub Relay
//!
//! Bus consumer that turns delivered outbox envelopes into hub broadcasts.
//! The outbox delivers at least once, so envelopes are deduplicated by
//! their outbox id before they reach observers.

use pb_03_outbox::OutboxEnvelope;
use pb_04_broadcast_hub::Broadcaster;
use shared_bus::{BusMessage, IdempotentConsumer, Subscription};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What happened to one bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Broadcast,
    Duplicate,
    /// Not an outbox envelope.
    Undecodable,
    /// The hub refused it (saturated or shut down).
    Dropped,
}

pub struct HubRelay {
    hub: Arc<dyn Broadcaster>,
    seen: IdempotentConsumer,
}

impl HubRelay {
    pub fn new(hub: Arc<dyn Broadcaster>) -> Self {
        Self {
            hub,
            seen: IdempotentConsumer::new(),
        }
    }

    pub fn relay(&mut self, message: &BusMessage) -> RelayOutcome {
        let envelope: OutboxEnvelope = match message.json() {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(topic = %message.topic, key = %message.key, error = %e, "Undecodable bus message");
                return RelayOutcome::Undecodable;
            }
        };
        if !self.seen.first_delivery(&envelope.id) {
            debug!(entry_id = %envelope.id, attempt = envelope.attempt, "Duplicate delivery skipped");
            return RelayOutcome::Duplicate;
        }

        let sent = match &envelope.request_id {
            Some(request_id) => {
                self.hub
                    .broadcast_with_correlation(request_id, &envelope.topic, envelope.data)
            }
            None => self.hub.broadcast(&envelope.topic, envelope.data),
        };
        match sent {
            Ok(()) => RelayOutcome::Broadcast,
            Err(e) => {
                debug!(entry_id = %envelope.id, error = %e, "Hub refused relayed message");
                RelayOutcome::Dropped
            }
        }
    }

    /// Relay until `shutdown` fires or the bus goes away.
    pub async fn run(mut self, mut subscription: Subscription, mut shutdown: watch::Receiver<bool>) {
        info!("Hub relay started");
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                message = subscription.recv() => match message {
                    Some(message) => {
                        self.relay(&message);
                    }
                    None => break,
                },
            }
        }
        info!(duplicates = self.seen.duplicates(), "Hub relay stopped");
    }
}
