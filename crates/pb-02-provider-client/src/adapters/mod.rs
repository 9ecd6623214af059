//! Adapters layer.

pub mod http;
