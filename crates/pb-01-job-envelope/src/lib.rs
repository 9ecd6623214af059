//! # Job Envelope Subsystem (PB-01)
//!
//! Canonicalizes, signs and verifies job specifications.
//!
//! ## Architecture
//!
//! This subsystem follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): validation, canonical form, signing, replay
//!   and trust checks. Pure logic, no I/O.
//! - **Ports Layer** (`ports/`): the `JobEnvelopeApi` driving port
//! - **Service Layer** (`service.rs`): binds a trust policy and replay guard
//!   to the domain functions
//!
//! ## Envelope Lifecycle
//!
//! ```text
//!  build (unsigned) ──▶ validate (defaults) ──▶ sign ──▶ verify_signature
//!                                                 │
//!                        any mutation after this ─┘ invalidates the signature
//! ```
//!
//! The signature covers the canonical form: the spec as JSON with object keys
//! sorted at every level and the `signature`/`public_key` fields removed.
//! Defaults are part of what gets signed, so validation must run first.

pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use domain::canonical::canonical_bytes;
pub use domain::errors::{ReplayError, SigningError, ValidationError, VerificationError};
pub use domain::replay::ReplayGuard;
pub use domain::signing::{sign, verify_signature};
pub use domain::trust::TrustPolicy;
pub use domain::validation::{check_structure, validate};
pub use ports::inbound::JobEnvelopeApi;
pub use service::EnvelopeService;
