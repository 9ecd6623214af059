//! Domain layer.

pub mod demand;
pub mod errors;
pub mod negotiation;
pub mod retry;
