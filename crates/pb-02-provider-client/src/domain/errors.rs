//! # Client Errors
//!
//! `ClientError` is the outcome of one marketplace call after the retry loop.
//! `NegotiationError` is what a whole negotiation attempt surfaces.

use crate::domain::negotiation::NegotiationState;
use shared_types::ContextError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single marketplace call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http {
        status: u16,
        body: String,
        /// Parsed `Retry-After` hint, only for 429/503.
        retry_after: Option<Duration>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    /// Connection, TLS or I/O failure before a status was received.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Deadline or cancellation fired; no further attempt was made.
    #[error("{reason} after {attempts} attempt(s)")]
    Cancelled { attempts: u32, reason: ContextError },

    /// Retryable failures exhausted the attempt budget.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<ClientError>,
    },

    /// No probe candidate answered with 200.
    #[error("probe failed: last_url={last_url} status={last_status:?}")]
    ProbeFailed {
        last_url: String,
        last_status: Option<u16>,
    },
}

impl ClientError {
    /// 5xx, 429 and transport failures may succeed on a later attempt.
    /// Every other 4xx is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http { status, .. } => *status == 429 || *status >= 500,
            ClientError::Transport(_) => true,
            _ => false,
        }
    }

    /// Server-provided wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ClientError::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Attempts spent, for errors that went through the retry loop.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ClientError::Cancelled { attempts, .. } | ClientError::Exhausted { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::InvalidResponse(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

/// Failure of a negotiation attempt for one region.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NegotiationError {
    /// A marketplace call failed while in `state`.
    #[error("negotiation failed during {state}: {source}")]
    Client {
        state: NegotiationState,
        #[source]
        source: ClientError,
    },

    /// No offer arrived before the provider timeout.
    #[error("no offer for demand {demand_id} within {waited:?}")]
    TimedOut { demand_id: String, waited: Duration },

    /// The marketplace rejected the demand.
    #[error("demand {demand_id} rejected: {reason}")]
    Rejected { demand_id: String, reason: String },

    /// The caller's context ended between steps.
    #[error("negotiation {0}")]
    Cancelled(ContextError),
}

impl NegotiationError {
    /// Attempts spent on the failing call, when known.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            NegotiationError::Client { source, .. } => source.attempts(),
            _ => None,
        }
    }

    /// Outcome label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            NegotiationError::Client { .. } => "error",
            NegotiationError::TimedOut { .. } => "timed_out",
            NegotiationError::Rejected { .. } => "rejected",
            NegotiationError::Cancelled(_) => "cancelled",
        }
    }
}
