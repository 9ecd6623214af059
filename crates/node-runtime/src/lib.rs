//! # Beacon Node Runtime
//!
//! Wires the Beacon subsystems into one process and exposes them over HTTP.
//! The `beacon-node` binary in `main.rs` is a thin shell around
//! [`NodeRuntime`].
//!
//! ## Modules
//!
//! - `config/` - environment configuration and validation
//! - `auth/` - bearer token roles for the HTTP surface
//! - `jobs/` - job admission and the job record store
//! - `runner/` - per-region negotiation, aggregation and anchoring
//! - `relay/` - bus to broadcast hub bridge
//! - `server/` - axum routes
//! - `runtime/` - construction, background tasks, shutdown

#![allow(clippy::type_complexity)]

pub mod auth;
pub mod config;
pub mod jobs;
pub mod relay;
pub mod runner;
pub mod runtime;
pub mod server;

pub use config::{load_config, ConfigError, RuntimeConfig};
pub use jobs::{JobError, JobRecord, JobsService};
pub use runner::{JobReport, JobRunner};
pub use runtime::{NodeRuntime, RuntimeError};
