//! # Observers

use chrono::{DateTime, Utc};
use std::fmt;

/// Hub-assigned observer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    Connecting,
    /// In the observer set; nothing delivered yet.
    Registered,
    /// At least one message delivered.
    Active,
    Disconnected,
}

/// Diagnostic view of a connected observer.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverInfo {
    pub id: ObserverId,
    /// Correlation id supplied by the client at connect time.
    pub correlation_id: Option<String>,
    pub state: ObserverState,
    pub connected_at: DateTime<Utc>,
}
