//! Prometheus metrics for Beacon.
//!
//! All metrics follow the naming convention: `beacon_<component>_<metric>`
//!
//! Components that keep their own atomic counters (hub, outbox) are mirrored
//! into these at scrape time with [`advance_counter`].

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    // =========================================================================
    // BROADCAST HUB
    // =========================================================================

    /// Messages fanned out by the hub loop
    pub static ref HUB_BROADCASTS: IntCounter = IntCounter::new(
        "beacon_hub_broadcasts_total",
        "Total messages fanned out to observers"
    ).expect("metric creation failed");

    /// Broadcasts dropped because the hub intake was full
    pub static ref HUB_DROPPED: IntCounter = IntCounter::new(
        "beacon_hub_dropped_total",
        "Broadcasts dropped on hub intake saturation"
    ).expect("metric creation failed");

    /// Observers disconnected for a full send buffer
    pub static ref HUB_EVICTED: IntCounter = IntCounter::new(
        "beacon_hub_evicted_total",
        "Slow observers evicted"
    ).expect("metric creation failed");

    pub static ref HUB_CONNECTIONS: IntGauge = IntGauge::new(
        "beacon_hub_connections",
        "Currently registered observers"
    ).expect("metric creation failed");

    // =========================================================================
    // OUTBOX
    // =========================================================================

    pub static ref OUTBOX_PUBLISHED: IntCounter = IntCounter::new(
        "beacon_outbox_published_total",
        "Outbox entries delivered to the bus"
    ).expect("metric creation failed");

    pub static ref OUTBOX_PUBLISH_ERRORS: IntCounter = IntCounter::new(
        "beacon_outbox_publish_errors_total",
        "Bus publish failures (entries stay pending)"
    ).expect("metric creation failed");

    pub static ref OUTBOX_UNPUBLISHED: IntGauge = IntGauge::new(
        "beacon_outbox_unpublished",
        "Outbox entries waiting for delivery"
    ).expect("metric creation failed");

    // =========================================================================
    // NEGOTIATION / ANCHORING
    // =========================================================================

    /// Per-region negotiation outcomes
    pub static ref NEGOTIATION_ATTEMPTS: IntCounterVec = IntCounterVec::new(
        Opts::new("beacon_negotiation_attempts_total", "Region negotiations by outcome"),
        &["outcome"]  // completed, error, timed_out, rejected, cancelled
    ).expect("metric creation failed");

    pub static ref ANCHORS: IntCounterVec = IntCounterVec::new(
        Opts::new("beacon_anchors_total", "Anchoring attempts by network and outcome"),
        &["network", "outcome"]
    ).expect("metric creation failed");

    /// Global metrics registry, with every metric above registered
    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(HUB_BROADCASTS.clone()),
            Box::new(HUB_DROPPED.clone()),
            Box::new(HUB_EVICTED.clone()),
            Box::new(HUB_CONNECTIONS.clone()),
            Box::new(OUTBOX_PUBLISHED.clone()),
            Box::new(OUTBOX_PUBLISH_ERRORS.clone()),
            Box::new(OUTBOX_UNPUBLISHED.clone()),
            Box::new(NEGOTIATION_ATTEMPTS.clone()),
            Box::new(ANCHORS.clone()),
        ];
        for metric in metrics {
            registry.register(metric).expect("metric registration failed");
        }
        registry
    };
}

/// Raise `counter` to `observed` if it is behind. Counters never go down.
pub fn advance_counter(counter: &IntCounter, observed: u64) {
    let current = counter.get();
    if observed > current {
        counter.inc_by(observed - current);
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsEncode(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsEncode(e.to_string()))
}
