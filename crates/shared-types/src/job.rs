//! # Job Specification
//!
//! The signed description of a compute task, its resource needs and its
//! multi-region success constraints.
//!
//! A `JobSpec` is built unsigned (`signature` and `public_key` empty), passed
//! through validation which fills in defaults, and then signed. Any mutation
//! after signing invalidates the signature.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Success rate applied when the caller leaves it unset.
pub const DEFAULT_MIN_SUCCESS_RATE: f64 = 0.67;

/// Provider timeout applied when the caller leaves it unset.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);

/// Minimum number of regions applied when the caller leaves it unset.
pub const DEFAULT_MIN_REGIONS: u32 = 1;

/// A compute job submitted to the provider marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Caller-assigned unique identifier.
    pub id: String,
    /// Schema version tag (e.g. "v1").
    pub version: String,
    /// What to run.
    pub benchmark: BenchmarkSpec,
    /// Where to run it and what counts as success.
    pub constraints: ExecutionConstraints,
    /// Anti-replay fields plus free-form annotations.
    #[serde(default)]
    pub metadata: JobMetadata,
    /// Base64 Ed25519 signature over the canonical form.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
    /// Base64 Ed25519 verifying key.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub public_key: String,
}

impl JobSpec {
    /// Create an unsigned job with empty metadata.
    pub fn new(
        id: impl Into<String>,
        benchmark: BenchmarkSpec,
        constraints: ExecutionConstraints,
    ) -> Self {
        Self {
            id: id.into(),
            version: "v1".to_string(),
            benchmark,
            constraints,
            metadata: JobMetadata::default(),
            signature: String::new(),
            public_key: String::new(),
        }
    }

    /// True once both signature fields are populated.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty() && !self.public_key.is_empty()
    }

    /// Drop signature material, e.g. before re-signing a mutated spec.
    pub fn clear_signature(&mut self) {
        self.signature.clear();
        self.public_key.clear();
    }
}

/// Benchmark descriptor: what container to run and with which resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BenchmarkSpec {
    pub name: String,
    pub container: ContainerSpec,
    #[serde(default)]
    pub resources: ResourceRequests,
}

/// Container image reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContainerSpec {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ContainerSpec {
    /// `image:tag`, or the bare image when no tag is set.
    pub fn reference(&self) -> String {
        match &self.tag {
            Some(tag) => format!("{}:{}", self.image, tag),
            None => self.image.clone(),
        }
    }
}

/// Resource requests forwarded to providers as demand properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResourceRequests {
    #[serde(default)]
    pub cpu: u32,
    /// Memory in MiB.
    #[serde(default)]
    pub memory_mb: u64,
    #[serde(default)]
    pub gpu: bool,
}

/// Multi-region placement and success constraints.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExecutionConstraints {
    /// Region codes the job must be attempted in.
    pub regions: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_regions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_success_rate: Option<f64>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(skip_serializing_if = "Option::is_none", rename = "provider_timeout_ms")]
    pub provider_timeout: Option<Duration>,
}

impl ExecutionConstraints {
    /// Constraints over the given regions with every tunable unset.
    pub fn for_regions<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            regions: regions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn min_regions(&self) -> u32 {
        self.min_regions.unwrap_or(DEFAULT_MIN_REGIONS)
    }

    pub fn min_success_rate(&self) -> f64 {
        self.min_success_rate.unwrap_or(DEFAULT_MIN_SUCCESS_RATE)
    }

    pub fn provider_timeout(&self) -> Duration {
        self.provider_timeout.unwrap_or(DEFAULT_PROVIDER_TIMEOUT)
    }
}

/// Anti-replay fields. Unknown keys are preserved in `extra` so that they
/// stay covered by the signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}
