//! # Inbound Ports (Driving Ports / API)

use crate::domain::errors::{SigningError, ValidationError, VerificationError};
use shared_crypto::{Ed25519KeyPair, Ed25519PublicKey};
use shared_types::JobSpec;

/// Job envelope API.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait JobEnvelopeApi: Send + Sync {
    /// Apply defaults and check structural completeness.
    fn validate(&self, spec: &mut JobSpec) -> Result<(), ValidationError>;

    /// Sign the canonical form of `spec` with `key`.
    fn sign(&self, spec: JobSpec, key: &Ed25519KeyPair) -> Result<JobSpec, SigningError>;

    /// Check the embedded signature; returns the signer's key.
    fn verify_signature(&self, spec: &JobSpec) -> Result<Ed25519PublicKey, VerificationError>;

    /// Full admission check for an externally signed spec: signature, trust
    /// policy and replay window.
    fn admit(&self, spec: &JobSpec) -> Result<Ed25519PublicKey, VerificationError>;
}
