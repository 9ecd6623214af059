use thiserror::Error;

/// Failures decoding key material or checking a signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Decoded bytes have the wrong size for the target type.
    #[error("expected {expected} bytes, decoded {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("signature does not match message and key")]
    SignatureVerificationFailed,

    #[error("malformed signature")]
    InvalidSignatureFormat,

    /// Not a point on the curve.
    #[error("malformed public key")]
    InvalidPublicKey,

    /// Seed text is not 32 bytes of hex.
    #[error("malformed signing seed")]
    InvalidPrivateKey,

    #[error("undecodable text: {0}")]
    InvalidEncoding(String),
}
