//! # Delivery Flows
//!
//! Outbox entries travel to observers through the bus and the hub relay:
//!
//! ```text
//! commit(state + entry) → OutboxPublisher::scan_once → bus → HubRelay → Hub → observer
//! ```
//!
//! Delivery is at least once up to the relay and exactly once after it.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use node_runtime::relay::{HubRelay, RelayOutcome};
    use pb_03_outbox::{
        InMemoryOutboxStore, OutboxEnvelope, OutboxPublisher, OutboxPublisherApi, OutboxStore,
        PublisherConfig, WriteBatch,
    };
    use pb_04_broadcast_hub::{Hub, HubConfig};
    use serde_json::{json, Value};
    use shared_bus::{BusError, BusMessage, InMemoryBus, MessageBus, TopicFilter};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Bus that rejects the first `failures` publishes.
    struct FlakyBus {
        inner: InMemoryBus,
        failures: AtomicU32,
    }

    #[async_trait]
    impl MessageBus for FlakyBus {
        async fn publish(&self, message: BusMessage) -> Result<(), BusError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(BusError::Unavailable("broker restarting".into()));
            }
            self.inner.publish(message).await
        }
    }

    #[tokio::test]
    async fn test_bus_outage_still_reaches_observer_once() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let bus = Arc::new(FlakyBus {
            inner: InMemoryBus::new(),
            failures: AtomicU32::new(1),
        });
        let mut subscription = bus.inner.subscribe(TopicFilter::all());
        let publisher = OutboxPublisher::new(store.clone(), bus.clone(), PublisherConfig::default());

        let (hub, hub_task) = Hub::spawn(HubConfig::for_testing());
        let mut observer = hub.register(None).await.unwrap();

        let mut batch = WriteBatch::new();
        batch
            .put_state("job:job-9", &json!({"status": "completed"}))
            .unwrap();
        let entry_id = batch
            .enqueue_correlated(
                "job-completed",
                &json!({"id": "job-9", "regions": {"US": "completed"}}),
                Some("req-9".into()),
            )
            .unwrap();
        store.commit(batch).unwrap();

        // First scan hits the outage and leaves the entry pending.
        assert!(publisher.scan_once().await.is_err());
        assert_eq!(store.unpublished_stats().unwrap().count, 1);

        let report = publisher.scan_once().await.unwrap();
        assert_eq!(report.published, 1);
        assert_eq!(publisher.scan_once().await.unwrap().fetched, 0);

        let entry = store.get_entry(&entry_id).unwrap().unwrap();
        assert!(entry.published_at.is_some());
        assert_eq!(entry.attempts, 1);

        let delivered = subscription.recv().await.unwrap();
        assert_eq!(delivered.key, entry_id);
        let envelope: OutboxEnvelope = delivered.json().unwrap();
        assert_eq!(envelope.attempt, 2);

        // A redelivery of the same entry is absorbed by the relay.
        let mut relay = HubRelay::new(Arc::new(hub.clone()));
        assert_eq!(relay.relay(&delivered), RelayOutcome::Broadcast);
        assert_eq!(relay.relay(&delivered), RelayOutcome::Duplicate);

        let frame = tokio::time::timeout(Duration::from_secs(2), observer.receiver.recv())
            .await
            .unwrap()
            .unwrap();
        let message: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            message,
            json!({
                "type": "job-completed",
                "data": {"id": "job-9", "regions": {"US": "completed"}},
                "request_id": "req-9"
            })
        );
        assert!(
            tokio::time::timeout(Duration::from_millis(100), observer.receiver.recv())
                .await
                .is_err()
        );

        hub.shutdown().await;
        hub_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_entries_publish_in_commit_order() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let bus = Arc::new(InMemoryBus::new());
        let mut subscription = bus.subscribe(TopicFilter::all());
        let publisher = OutboxPublisher::new(
            store.clone(),
            bus.clone(),
            PublisherConfig {
                batch_size: 2,
                ..PublisherConfig::default()
            },
        );

        let mut ids = Vec::new();
        for topic in ["job-created", "job-started", "job-completed"] {
            let mut batch = WriteBatch::new();
            ids.push(batch.enqueue(topic, &json!({"id": "job-3"})).unwrap());
            store.commit(batch).unwrap();
        }

        assert_eq!(publisher.scan_once().await.unwrap().published, 2);
        assert_eq!(publisher.scan_once().await.unwrap().published, 1);

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(subscription.recv().await.unwrap().key);
        }
        assert_eq!(seen, ids);
        assert_eq!(publisher.counters().published, 3);
    }
}
