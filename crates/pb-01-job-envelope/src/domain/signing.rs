//! # Signing and Verification
//!
//! Ed25519 over the canonical form. `sign` does not apply defaults: it signs
//! exactly the spec it is given, so callers run `validate` first.

use crate::domain::canonical::canonical_bytes;
use crate::domain::errors::{SigningError, VerificationError};
use crate::domain::validation::check_structure;
use shared_crypto::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use shared_types::JobSpec;
use tracing::debug;

/// Sign `spec` with `key`, populating `signature` and the derived
/// `public_key`. Any previous signature material is replaced.
pub fn sign(mut spec: JobSpec, key: &Ed25519KeyPair) -> Result<JobSpec, SigningError> {
    check_structure(&spec)?;
    spec.clear_signature();

    let message =
        canonical_bytes(&spec).map_err(|e| SigningError::Canonicalization(e.to_string()))?;
    let signature = key.sign(&message);

    spec.signature = signature.to_base64();
    spec.public_key = key.public_key().to_base64();
    debug!(job_id = %spec.id, public_key = %spec.public_key, "Job spec signed");
    Ok(spec)
}

/// Verify the embedded signature against the embedded public key.
///
/// Returns the verifying key on success so callers can apply a trust policy.
pub fn verify_signature(spec: &JobSpec) -> Result<Ed25519PublicKey, VerificationError> {
    if spec.signature.is_empty() {
        return Err(VerificationError::MissingSignature);
    }
    if spec.public_key.is_empty() {
        return Err(VerificationError::MissingPublicKey);
    }

    let public_key = Ed25519PublicKey::from_base64(&spec.public_key)
        .map_err(|_| VerificationError::MalformedPublicKey)?;
    let signature = Ed25519Signature::from_base64(&spec.signature)
        .map_err(|_| VerificationError::MalformedSignature)?;
    let message =
        canonical_bytes(spec).map_err(|e| VerificationError::Canonicalization(e.to_string()))?;

    public_key
        .verify(&message, &signature)
        .map_err(|_| VerificationError::SignatureMismatch)?;
    Ok(public_key)
}
