//! # Provider Client Subsystem (PB-02)
//!
//! Negotiates compute jobs against a marketplace that speaks a demand/offer
//! protocol over HTTP, tolerating transient failures.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): retry policy, demand/offer records and the
//!   per-attempt negotiation state machine
//! - **Ports Layer** (`ports/`): `NegotiationApi` (driving) and
//!   `ProviderNetwork` (driven)
//! - **Adapters** (`adapters/`): `MarketplaceClient`, the reqwest-backed
//!   `ProviderNetwork`
//! - **Service Layer** (`service.rs`): `Negotiator`, which walks one region
//!   through the state machine
//!
//! ## Negotiation State Machine
//!
//! ```text
//!  Idle ──▶ Probing ──▶ DemandCreated ──┬──▶ OfferReceived
//!                                       ├──▶ Rejected
//!                                       └──▶ TimedOut
//! ```
//!
//! Terminal states are never retried here. Only transport-level failures
//! inside a single step (5xx, 429, connection errors) are retried, with
//! exponential backoff bounded by the caller's [`CallContext`] deadline.
//!
//! [`CallContext`]: shared_types::CallContext

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::http::{MarketplaceClient, MarketplaceConfig};
pub use domain::demand::{
    DemandEvent, DemandSpec, ExecOutcome, ExecutionHandle, ProbeResult, ProviderOffer,
};
pub use domain::errors::{ClientError, NegotiationError};
pub use domain::negotiation::{Negotiation, NegotiationState};
pub use domain::retry::RetryPolicy;
pub use ports::inbound::NegotiationApi;
pub use ports::outbound::ProviderNetwork;
pub use service::{Negotiator, NegotiatorConfig};
