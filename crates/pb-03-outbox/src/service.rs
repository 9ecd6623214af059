//! # Outbox Publisher
//!
//! Background scan loop. Each scan fetches a batch of unpublished entries in
//! commit order, publishes them one by one and marks each published after
//! the bus accepts it. The first bus error ends the scan; the failed entry
//! and everything after it wait for the next tick. Nothing is ever dropped.

use crate::domain::entry::UnpublishedStats;
use crate::domain::errors::PublishError;
use crate::ports::inbound::OutboxPublisherApi;
use crate::ports::outbound::OutboxStore;
use async_trait::async_trait;
use chrono::Utc;
use shared_bus::{BusMessage, MessageBus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Entries fetched per scan.
    pub batch_size: usize,
    pub poll_interval: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// What one scan did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub fetched: usize,
    pub published: usize,
    /// Entries the bus accepted that another publisher had already marked.
    pub already_marked: usize,
}

/// Snapshot of the publisher's local counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherCounters {
    pub scans: u64,
    pub published: u64,
    pub errors: u64,
}

pub struct OutboxPublisher {
    store: Arc<dyn OutboxStore>,
    bus: Arc<dyn MessageBus>,
    config: PublisherConfig,
    scans: AtomicU64,
    published: AtomicU64,
    errors: AtomicU64,
}

impl OutboxPublisher {
    pub fn new(store: Arc<dyn OutboxStore>, bus: Arc<dyn MessageBus>, config: PublisherConfig) -> Self {
        Self {
            store,
            bus,
            config,
            scans: AtomicU64::new(0),
            published: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn counters(&self) -> PublisherCounters {
        PublisherCounters {
            scans: self.scans.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    /// Scan on every tick until `shutdown` flips to true or its sender is
    /// dropped. A scan in progress always runs to completion.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Outbox publisher started"
        );
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match self.scan_once().await {
                        Ok(report) if report.fetched > 0 => {
                            debug!(fetched = report.fetched, published = report.published, "Outbox scan");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Outbox scan stopped early"),
                    }
                }
            }
        }
        info!("Outbox publisher stopped");
    }
}

#[async_trait]
impl OutboxPublisherApi for OutboxPublisher {
    async fn scan_once(&self) -> Result<ScanReport, PublishError> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        let entries = self.store.fetch_unpublished(self.config.batch_size)?;
        let mut report = ScanReport {
            fetched: entries.len(),
            ..ScanReport::default()
        };

        for entry in entries {
            let envelope = entry.envelope(entry.attempts + 1);
            let payload = serde_json::to_vec(&envelope).map_err(|e| PublishError::Encode {
                entry_id: entry.id.clone(),
                message: e.to_string(),
            })?;
            let message = BusMessage::new(entry.topic.clone(), entry.id.clone(), payload);

            if let Err(source) = self.bus.publish(message).await {
                self.errors.fetch_add(1, Ordering::Relaxed);
                self.store.record_failure(&entry.id, &source.to_string())?;
                warn!(
                    entry_id = %entry.id,
                    topic = %entry.topic,
                    attempt = envelope.attempt,
                    error = %source,
                    "Outbox publish failed, will retry"
                );
                return Err(PublishError::Bus {
                    entry_id: entry.id,
                    source,
                });
            }

            if self.store.mark_published(&entry.id, Utc::now())? {
                self.published.fetch_add(1, Ordering::Relaxed);
                report.published += 1;
                debug!(entry_id = %entry.id, topic = %entry.topic, "Outbox entry published");
            } else {
                report.already_marked += 1;
            }
        }

        Ok(report)
    }

    fn unpublished_stats(&self) -> Result<UnpublishedStats, PublishError> {
        Ok(self.store.unpublished_stats()?)
    }
}
