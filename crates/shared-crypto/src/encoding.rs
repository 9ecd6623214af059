//! Base64 helpers (standard alphabet, padded).

use crate::CryptoError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encode bytes as standard base64.
pub fn encode_base64(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))
}

/// Decode standard base64 into a fixed-size array.
pub(crate) fn decode_fixed<const N: usize>(text: &str) -> Result<[u8; N], CryptoError> {
    let bytes = decode_base64(text)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
        expected: N,
        actual,
    })
}
