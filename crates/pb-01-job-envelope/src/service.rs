//! # Envelope Service
//!
//! Implements [`JobEnvelopeApi`] over the domain functions, adding the
//! submitter trust policy and a shared replay guard.

use crate::domain::errors::{SigningError, ValidationError, VerificationError};
use crate::domain::replay::ReplayGuard;
use crate::domain::signing;
use crate::domain::trust::TrustPolicy;
use crate::domain::validation;
use crate::ports::inbound::JobEnvelopeApi;
use parking_lot::Mutex;
use shared_crypto::{Ed25519KeyPair, Ed25519PublicKey};
use shared_types::JobSpec;
use tracing::warn;

pub struct EnvelopeService {
    trust: TrustPolicy,
    replay: Mutex<ReplayGuard>,
}

impl EnvelopeService {
    #[must_use]
    pub fn new(trust: TrustPolicy) -> Self {
        Self::with_replay_guard(trust, ReplayGuard::new())
    }

    #[must_use]
    pub fn with_replay_guard(trust: TrustPolicy, guard: ReplayGuard) -> Self {
        Self {
            trust,
            replay: Mutex::new(guard),
        }
    }
}

impl Default for EnvelopeService {
    fn default() -> Self {
        Self::new(TrustPolicy::allow_any())
    }
}

impl JobEnvelopeApi for EnvelopeService {
    fn validate(&self, spec: &mut JobSpec) -> Result<(), ValidationError> {
        validation::validate(spec)
    }

    fn sign(&self, spec: JobSpec, key: &Ed25519KeyPair) -> Result<JobSpec, SigningError> {
        signing::sign(spec, key)
    }

    fn verify_signature(&self, spec: &JobSpec) -> Result<Ed25519PublicKey, VerificationError> {
        signing::verify_signature(spec)
    }

    fn admit(&self, spec: &JobSpec) -> Result<Ed25519PublicKey, VerificationError> {
        let key = signing::verify_signature(spec)?;
        if !self.trust.is_trusted(&key) {
            warn!(job_id = %spec.id, "Rejected job spec from untrusted submitter");
            return Err(VerificationError::UntrustedKey(key.to_base64()));
        }
        self.replay
            .lock()
            .check_and_record(spec.metadata.nonce.as_deref(), spec.metadata.timestamp)?;
        Ok(key)
    }
}
