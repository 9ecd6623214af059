//! Anchoring backends.

pub mod composite;
pub mod ledger;
pub mod timestamp;
