//! # Ed25519 Signatures
//!
//! Twisted Edwards curve signatures with deterministic nonces. Keys and
//! signatures travel as standard base64 on the wire.
//!
//! Signing needs no randomness. Verification goes through `verify_strict`,
//! so malleable signatures are rejected. Seed copies are zeroized.

use crate::encoding::{decode_fixed, encode_base64};
use crate::CryptoError;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use zeroize::Zeroizing;

/// Verifying key, validated as a curve point on construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey([u8; 32]);

impl Ed25519PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Parse the base64 wire form.
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(decode_fixed::<32>(text)?)
    }

    /// Base64 wire form.
    pub fn to_base64(&self) -> String {
        encode_base64(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CryptoError> {
        VerifyingKey::from_bytes(&self.0)
            .map_err(|_| CryptoError::InvalidPublicKey)?
            .verify_strict(message, &ed25519_dalek::Signature::from_bytes(&signature.0))
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519Signature([u8; 64]);

impl Ed25519Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Parse the base64 wire form.
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        decode_fixed::<64>(text)
            .map(Self)
            .map_err(|_| CryptoError::InvalidSignatureFormat)
    }

    /// Parse lowercase or uppercase hex.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let mut out = [0u8; 64];
        hex::decode_to_slice(text, &mut out).map_err(|_| CryptoError::InvalidSignatureFormat)?;
        Ok(Self(out))
    }

    /// Base64 wire form.
    pub fn to_base64(&self) -> String {
        encode_base64(self.0)
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

/// Node or submitter signing key. `Debug` shows only the public half.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("public_key", &self.public_key().to_base64())
            .finish_non_exhaustive()
    }
}

impl Ed25519KeyPair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        let seed = Zeroizing::new(seed);
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Create from a 64-character hex seed, as read from configuration.
    pub fn from_seed_hex(text: &str) -> Result<Self, CryptoError> {
        let mut seed = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(text.trim(), &mut seed[..])
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self::from_seed(*seed))
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }
}
