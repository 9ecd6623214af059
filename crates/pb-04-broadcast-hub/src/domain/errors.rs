//! # Hub Errors

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HubError {
    /// The hub loop has stopped.
    #[error("hub is shut down")]
    Closed,

    /// Intake queue full; the broadcast was dropped and counted.
    #[error("hub intake saturated, broadcast dropped")]
    Saturated,

    #[error("failed to encode message: {0}")]
    Encode(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("write did not complete within the write deadline")]
    WriteTimeout,

    /// Nothing was read from the observer within the liveness deadline.
    #[error("observer missed liveness deadline")]
    LivenessTimeout,

    #[error("inbound frame of {size} bytes exceeds limit of {max}")]
    MessageTooLarge { size: usize, max: usize },
}
