//! # Anchor Errors

use shared_types::ContextError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnchorError {
    #[error("invalid content hash: {0:?}")]
    InvalidHash(String),

    /// The backend could not be reached.
    #[error("{network} unavailable: {message}")]
    Unavailable { network: String, message: String },

    /// The backend answered with an error.
    #[error("{network} rejected request ({code}): {message}")]
    Rejected {
        network: String,
        code: i64,
        message: String,
    },

    #[error("invalid response from {network}: {message}")]
    InvalidResponse { network: String, message: String },

    /// No backend produced or recognizes this anchor.
    #[error("anchor not found: {0}")]
    NotFound(String),

    /// Every backend failed, in the order they were tried.
    #[error("all anchoring backends failed: {}", summarize(.0))]
    AllFailed(Vec<(String, AnchorError)>),

    #[error("no anchoring backends configured")]
    NoBackends,

    #[error("anchor {0} failed on chain")]
    Failed(String),

    #[error("anchor {tx_handle} not confirmed within {waited:?}")]
    ConfirmationTimeout { tx_handle: String, waited: Duration },

    #[error("anchoring {0}")]
    Cancelled(ContextError),

    #[error("configuration error: {0}")]
    Config(String),
}

fn summarize(failures: &[(String, AnchorError)]) -> String {
    failures
        .iter()
        .map(|(network, cause)| format!("{network}: {cause}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ContextError> for AnchorError {
    fn from(e: ContextError) -> Self {
        AnchorError::Cancelled(e)
    }
}

impl AnchorError {
    /// Outcome label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            AnchorError::AllFailed(_) | AnchorError::NoBackends => "all_failed",
            AnchorError::Cancelled(_) | AnchorError::ConfirmationTimeout { .. } => "timed_out",
            _ => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_lists_every_backend() {
        let err = AnchorError::AllFailed(vec![
            (
                "timestamp".into(),
                AnchorError::Unavailable {
                    network: "timestamp".into(),
                    message: "key store locked".into(),
                },
            ),
            ("ethereum".into(), AnchorError::NotFound("0x1".into())),
        ]);
        let text = err.to_string();
        assert!(text.contains("timestamp: timestamp unavailable: key store locked"));
        assert!(text.contains("ethereum: anchor not found: 0x1"));
        assert_eq!(err.outcome(), "all_failed");
    }
}
