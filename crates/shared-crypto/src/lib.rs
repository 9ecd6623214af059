//! # Shared Crypto
//!
//! Key material and digests used across Beacon.
//!
//! | Module | Algorithm | Used by |
//! |--------|-----------|---------|
//! | `signatures` | Ed25519 | job envelopes, timestamp anchors |
//! | `hashing` | SHA-256 | job result digests |
//! | `encoding` | base64 (standard alphabet) | wire form of keys and signatures |

#![warn(clippy::all)]

pub mod encoding;
pub mod errors;
pub mod hashing;
pub mod signatures;

pub use encoding::{decode_base64, encode_base64};
pub use errors::CryptoError;
pub use hashing::{sha256, sha256_hex};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
