//! # Envelope Errors
//!
//! None of these are retried: a malformed or tampered envelope stays
//! malformed or tampered.

use thiserror::Error;

/// Structural problems with a job specification.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// A required field is empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("constraints.regions must not be empty")]
    NoRegions,

    #[error("constraints.min_regions must be between 1 and {regions}, got {min_regions}")]
    MinRegionsOutOfRange { min_regions: u32, regions: usize },

    #[error("constraints.min_success_rate must be in (0, 1], got {0}")]
    SuccessRateOutOfRange(f64),

    #[error("constraints.provider_timeout must be greater than zero")]
    ZeroProviderTimeout,
}

/// Failures while producing a signature.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SigningError {
    #[error("job spec is not signable: {0}")]
    Invalid(#[from] ValidationError),

    #[error("canonical serialization failed: {0}")]
    Canonicalization(String),
}

/// Failures while checking a signed specification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("job spec carries no signature")]
    MissingSignature,

    #[error("job spec carries no public key")]
    MissingPublicKey,

    #[error("malformed signature encoding")]
    MalformedSignature,

    #[error("malformed public key")]
    MalformedPublicKey,

    /// The signature does not match the canonical form and embedded key.
    #[error("signature does not match job spec")]
    SignatureMismatch,

    #[error("canonical serialization failed: {0}")]
    Canonicalization(String),

    #[error("public key {0} is not an allowed submitter")]
    UntrustedKey(String),

    #[error("replay rejected: {0}")]
    Replay(#[from] ReplayError),
}

/// Anti-replay failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("job spec metadata has no nonce")]
    MissingNonce,

    #[error("job spec metadata has no timestamp")]
    MissingTimestamp,

    /// The nonce has already been used.
    #[error("nonce {nonce} has already been used")]
    NonceReused { nonce: String },

    #[error("timestamp {timestamp} is older than {threshold}")]
    TooOld { timestamp: i64, threshold: i64 },

    #[error("timestamp {timestamp} is beyond {threshold}")]
    FromFuture { timestamp: i64, threshold: i64 },
}
