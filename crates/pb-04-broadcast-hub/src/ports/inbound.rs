//! # Inbound Ports (Driving Ports / API)

use crate::domain::errors::HubError;
use serde_json::Value;

/// Anything a component can notify observers through.
///
/// Both entry points are non-blocking. When the hub's intake is full the
/// message is dropped, counted and reported as [`HubError::Saturated`].
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, kind: &str, data: Value) -> Result<(), HubError>;

    /// Same as `broadcast`, tagged with the originating request's id.
    fn broadcast_with_correlation(
        &self,
        correlation_id: &str,
        kind: &str,
        data: Value,
    ) -> Result<(), HubError>;

    fn connection_count(&self) -> usize;
}
