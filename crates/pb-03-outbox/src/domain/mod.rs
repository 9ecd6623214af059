//! Domain layer.

pub mod entry;
pub mod errors;
