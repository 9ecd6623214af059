//! # Shared Types Crate
//!
//! Domain entities shared by every Beacon subsystem.
//!
//! ## Clusters
//!
//! - **Jobs**: [`JobSpec`], [`BenchmarkSpec`], [`ExecutionConstraints`], [`JobMetadata`]
//! - **Executions**: [`Execution`], [`ExecutionStatus`], [`JobStatus`], [`RegionVerification`]
//! - **Calls**: [`CallContext`], the deadline and cancellation carrier passed to
//!   every operation that may block on the network.

pub mod context;
pub mod execution;
pub mod job;

pub use context::{CallContext, ContextError};
pub use execution::{Execution, ExecutionStatus, JobStatus, RegionVerification};
pub use job::{
    BenchmarkSpec, ContainerSpec, ExecutionConstraints, JobMetadata, JobSpec, ResourceRequests,
    DEFAULT_MIN_REGIONS, DEFAULT_MIN_SUCCESS_RATE, DEFAULT_PROVIDER_TIMEOUT,
};
