//! Domain layer.

pub mod config;
pub mod errors;
pub mod frame;
pub mod message;
pub mod observer;
