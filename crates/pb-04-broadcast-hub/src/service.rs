//! # Hub Service
//!
//! [`Hub`] is the single coordinating loop. It owns the observer set and
//! handles register, unregister and broadcast strictly one at a time.
//! [`HubHandle`] is the cloneable front door used by producers and by
//! connection tasks.
//!
//! Messages are serialized once, before they enter the intake, and every
//! observer receives the same `Arc<str>`.

use crate::domain::config::HubConfig;
use crate::domain::errors::HubError;
use crate::domain::message::BroadcastMessage;
use crate::domain::observer::{ObserverId, ObserverInfo, ObserverState};
use crate::ports::inbound::Broadcaster;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Control channel depth. Control messages are awaited, never dropped.
const CONTROL_CAPACITY: usize = 64;

enum Control {
    Register {
        id: ObserverId,
        correlation_id: Option<String>,
        sender: mpsc::Sender<Arc<str>>,
        ack: oneshot::Sender<()>,
    },
    Unregister {
        id: ObserverId,
    },
    Shutdown,
}

#[derive(Default)]
struct HubStats {
    broadcasts: AtomicU64,
    dropped: AtomicU64,
    evicted: AtomicU64,
    registered: AtomicU64,
}

/// Snapshot of the hub's local counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubCounters {
    /// Messages fanned out by the loop.
    pub broadcasts: u64,
    /// Messages dropped at intake.
    pub dropped: u64,
    /// Observers disconnected for a full buffer.
    pub evicted: u64,
    pub registered: u64,
}

/// A registered observer's end of its outbound buffer.
pub struct Registration {
    pub id: ObserverId,
    /// Closed by the hub on unregister, eviction or shutdown.
    pub receiver: mpsc::Receiver<Arc<str>>,
}

struct Slot {
    sender: mpsc::Sender<Arc<str>>,
    delivered: bool,
}

type Snapshot = Arc<RwLock<HashMap<ObserverId, ObserverInfo>>>;

pub struct Hub {
    config: HubConfig,
    observers: HashMap<ObserverId, Slot>,
    control_rx: mpsc::Receiver<Control>,
    intake_rx: mpsc::Receiver<Arc<str>>,
    snapshot: Snapshot,
    stats: Arc<HubStats>,
}

#[derive(Clone)]
pub struct HubHandle {
    config: HubConfig,
    control_tx: mpsc::Sender<Control>,
    intake_tx: mpsc::Sender<Arc<str>>,
    snapshot: Snapshot,
    stats: Arc<HubStats>,
    next_id: Arc<AtomicU64>,
}

impl Hub {
    /// Build a hub and its handle. Nothing is delivered until [`Hub::run`]
    /// is polled.
    pub fn new(config: HubConfig) -> (Hub, HubHandle) {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (intake_tx, intake_rx) = mpsc::channel(config.intake_capacity.max(1));
        let snapshot: Snapshot = Arc::default();
        let stats = Arc::new(HubStats::default());

        let handle = HubHandle {
            config: config.clone(),
            control_tx,
            intake_tx,
            snapshot: snapshot.clone(),
            stats: stats.clone(),
            next_id: Arc::new(AtomicU64::new(0)),
        };
        let hub = Hub {
            config,
            observers: HashMap::new(),
            control_rx,
            intake_rx,
            snapshot,
            stats,
        };
        (hub, handle)
    }

    /// Build a hub and run its loop on the current runtime.
    pub fn spawn(config: HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(config);
        (handle, tokio::spawn(hub.run()))
    }

    /// The coordinating loop. Control messages take priority over queued
    /// broadcasts. Returns after shutdown, once every buffer is closed.
    pub async fn run(mut self) {
        info!(
            send_buffer = self.config.send_buffer,
            intake_capacity = self.config.intake_capacity,
            "Broadcast hub started"
        );

        loop {
            tokio::select! {
                biased;
                control = self.control_rx.recv() => match control {
                    Some(Control::Register { id, correlation_id, sender, ack }) => {
                        self.register(id, correlation_id, sender);
                        let _ = ack.send(());
                    }
                    Some(Control::Unregister { id }) => {
                        if self.remove(id) {
                            debug!(observer = %id, "Observer unregistered");
                        }
                    }
                    Some(Control::Shutdown) | None => break,
                },
                message = self.intake_rx.recv() => match message {
                    Some(message) => self.fan_out(message),
                    None => break,
                },
            }
        }

        let closed = self.observers.len();
        self.snapshot.write().clear();
        self.observers.clear();
        info!(closed, "Broadcast hub stopped");
    }

    fn register(&mut self, id: ObserverId, correlation_id: Option<String>, sender: mpsc::Sender<Arc<str>>) {
        self.snapshot.write().insert(
            id,
            ObserverInfo {
                id,
                correlation_id,
                state: ObserverState::Registered,
                connected_at: Utc::now(),
            },
        );
        self.observers.insert(
            id,
            Slot {
                sender,
                delivered: false,
            },
        );
        self.stats.registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop an observer. Its buffer closes when the sender is dropped, which
    /// happens after the snapshot no longer lists it.
    fn remove(&mut self, id: ObserverId) -> bool {
        self.snapshot.write().remove(&id);
        self.observers.remove(&id).is_some()
    }

    fn fan_out(&mut self, message: Arc<str>) {
        self.stats.broadcasts.fetch_add(1, Ordering::Relaxed);
        let mut first_delivery = Vec::new();
        let mut gone = Vec::new();

        for (id, slot) in self.observers.iter_mut() {
            match slot.sender.try_send(message.clone()) {
                Ok(()) => {
                    if !slot.delivered {
                        slot.delivered = true;
                        first_delivery.push(*id);
                    }
                }
                Err(TrySendError::Full(_)) => gone.push((*id, true)),
                Err(TrySendError::Closed(_)) => gone.push((*id, false)),
            }
        }

        if !first_delivery.is_empty() {
            let mut snapshot = self.snapshot.write();
            for id in first_delivery {
                if let Some(info) = snapshot.get_mut(&id) {
                    info.state = ObserverState::Active;
                }
            }
        }

        for (id, overflowed) in gone {
            if overflowed {
                self.stats.evicted.fetch_add(1, Ordering::Relaxed);
                warn!(observer = %id, buffer = self.config.send_buffer, "Observer buffer full, evicting");
            }
            self.remove(id);
        }
    }
}

impl HubHandle {
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Add an observer. Resolves once the loop has it in the set, so any
    /// broadcast issued afterwards reaches it. Control commands are served
    /// ahead of the intake queue, so broadcasts still queued when `register`
    /// was called may reach it as well.
    pub async fn register(&self, correlation_id: Option<String>) -> Result<Registration, HubError> {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (sender, receiver) = mpsc::channel(self.config.send_buffer.max(1));
        let (ack, acked) = oneshot::channel();

        self.control_tx
            .send(Control::Register {
                id,
                correlation_id,
                sender,
                ack,
            })
            .await
            .map_err(|_| HubError::Closed)?;
        acked.await.map_err(|_| HubError::Closed)?;

        Ok(Registration { id, receiver })
    }

    /// Remove an observer. A no-op if it is already gone or the hub stopped.
    pub async fn unregister(&self, id: ObserverId) {
        let _ = self.control_tx.send(Control::Unregister { id }).await;
    }

    /// Stop the loop. Every observer buffer is closed, which tears down the
    /// connection tasks.
    pub async fn shutdown(&self) {
        let _ = self.control_tx.send(Control::Shutdown).await;
    }

    /// Queue a message for fan-out without waiting.
    pub fn send(&self, message: &BroadcastMessage) -> Result<(), HubError> {
        let encoded: Arc<str> = Arc::from(message.encode()?);
        match self.intake_tx.try_send(encoded) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(kind = %message.kind, dropped, "Hub intake saturated, dropping broadcast");
                Err(HubError::Saturated)
            }
            Err(TrySendError::Closed(_)) => Err(HubError::Closed),
        }
    }

    pub fn observers(&self) -> Vec<ObserverInfo> {
        let mut list: Vec<_> = self.snapshot.read().values().cloned().collect();
        list.sort_by_key(|info| info.id);
        list
    }

    pub fn counters(&self) -> HubCounters {
        HubCounters {
            broadcasts: self.stats.broadcasts.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            evicted: self.stats.evicted.load(Ordering::Relaxed),
            registered: self.stats.registered.load(Ordering::Relaxed),
        }
    }
}

impl Broadcaster for HubHandle {
    fn broadcast(&self, kind: &str, data: Value) -> Result<(), HubError> {
        self.send(&BroadcastMessage::new(kind, data))
    }

    fn broadcast_with_correlation(
        &self,
        correlation_id: &str,
        kind: &str,
        data: Value,
    ) -> Result<(), HubError> {
        self.send(&BroadcastMessage::correlated(correlation_id, kind, data))
    }

    fn connection_count(&self) -> usize {
        self.snapshot.read().len()
    }
}
