//! Domain layer.

pub mod anchor;
pub mod config;
pub mod errors;
