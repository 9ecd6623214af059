//! # Beacon Telemetry
//!
//! Logging and metrics for the Beacon node.
//!
//! - **Logs**: `tracing-subscriber` with an `EnvFilter`, human-readable in
//!   development and JSON in containers
//! - **Metrics**: a Prometheus registry rendered as text at `/metrics`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use beacon_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_logging(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BEACON_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `BEACON_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `BEACON_SERVICE_NAME` | `beacon` | Service name on every log line |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    advance_counter, encode_metrics, ANCHORS, HUB_BROADCASTS, HUB_CONNECTIONS, HUB_DROPPED,
    HUB_EVICTED, NEGOTIATION_ATTEMPTS, OUTBOX_PUBLISHED, OUTBOX_PUBLISH_ERRORS,
    OUTBOX_UNPUBLISHED,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to encode metrics: {0}")]
    MetricsEncode(String),
}
