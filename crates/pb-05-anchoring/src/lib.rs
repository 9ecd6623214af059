//! # Anchoring Subsystem (PB-05)
//!
//! Produces externally verifiable, timestamped proofs that a content hash
//! existed at a point in time.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): `AnchorResult`, `AnchorStatus`, backend
//!   selection config and errors
//! - **Ports Layer** (`ports/`): `AnchorApi` (driving) and `AnchorStrategy`
//!   (driven, one per backend)
//! - **Adapters** (`adapters/`): Ed25519 timestamp authority, Ethereum
//!   JSON-RPC ledger, and the ordered composite
//! - **Service Layer** (`service.rs`): `AnchorService`
//!
//! ## Composite Fallback
//!
//! ```text
//!   anchor(hash) ──▶ backend[0] ──err──▶ backend[1] ──err──▶ ... ──▶ AllFailed[(network, cause)..]
//!                        │ ok               │ ok
//!                        ▼                  ▼
//!                   AnchorResult{network = backend[0]}   ...
//!
//!   verify(result) ──▶ backend whose network == result.network   (else NotFound)
//!   status(tx)     ──▶ first backend that recognizes tx          (else NotFound)
//! ```
//!
//! A result is only ever verified by the backend that produced it.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::composite::CompositeStrategy;
pub use adapters::ledger::{LedgerConfig, LedgerStrategy, LEDGER_NETWORK};
pub use adapters::timestamp::{TimestampStrategy, TIMESTAMP_NETWORK};
pub use domain::anchor::{AnchorResult, AnchorState, AnchorStatus};
pub use domain::config::{AnchorConfig, StrategyKind};
pub use domain::errors::AnchorError;
pub use ports::inbound::AnchorApi;
pub use ports::outbound::AnchorStrategy;
pub use service::{build_strategy, AnchorService};
