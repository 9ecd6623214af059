//! Domain layer: pure envelope logic.

pub mod canonical;
pub mod errors;
pub mod replay;
pub mod signing;
pub mod trust;
pub mod validation;
