//! # Executions
//!
//! One [`Execution`] exists per (job, region, provider) triple. Status only
//! moves forward; a finished execution is superseded, never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a single regional execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    /// `pending -> running -> completed | failed`. A pending execution may
    /// also fail directly when no provider accepts it.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Pending, Running) | (Pending, Failed) | (Running, Completed) | (Running, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate status of a job across all of its regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Submitted,
    Running,
    /// Enough regions succeeded to satisfy the job's constraints.
    Completed,
    /// At least `min_regions` succeeded, but under `min_success_rate`.
    Partial,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Partial => "partial",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Region the provider claimed versus the region independently observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RegionVerification {
    pub claimed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<String>,
    pub verified: bool,
}

impl RegionVerification {
    /// Build a verification record; `verified` is true only when an observed
    /// region exists and matches the claim.
    pub fn new(claimed: impl Into<String>, observed: Option<String>) -> Self {
        let claimed = claimed.into();
        let verified = observed.as_deref() == Some(claimed.as_str());
        Self {
            claimed,
            observed,
            verified,
        }
    }
}

/// One provider execution of a job in a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub job_id: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub status: ExecutionStatus,
    pub region_check: RegionVerification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Content-addressed storage reference for large outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Execution {
    /// A pending execution for `job_id` in `region`.
    pub fn pending(job_id: impl Into<String>, region: impl Into<String>) -> Self {
        let region = region.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_id: job_id.into(),
            region_check: RegionVerification::new(region.clone(), None),
            region,
            provider_id: None,
            status: ExecutionStatus::Pending,
            output: None,
            storage_ref: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next` if the transition is legal. Returns false and leaves the
    /// execution untouched otherwise.
    pub fn advance(&mut self, next: ExecutionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(ExecutionStatus::Pending.can_transition_to(ExecutionStatus::Running));
        assert!(ExecutionStatus::Running.can_transition_to(ExecutionStatus::Completed));
        assert!(ExecutionStatus::Pending.can_transition_to(ExecutionStatus::Failed));
        assert!(!ExecutionStatus::Completed.can_transition_to(ExecutionStatus::Running));
        assert!(!ExecutionStatus::Failed.can_transition_to(ExecutionStatus::Completed));
    }

    #[test]
    fn test_advance_rejects_illegal_move() {
        let mut exec = Execution::pending("job-1", "US");
        assert!(!exec.advance(ExecutionStatus::Completed));
        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert!(exec.advance(ExecutionStatus::Running));
        assert!(exec.advance(ExecutionStatus::Completed));
        assert!(exec.status.is_terminal());
    }

    #[test]
    fn test_region_verification() {
        assert!(RegionVerification::new("EU", Some("EU".into())).verified);
        assert!(!RegionVerification::new("EU", Some("US".into())).verified);
        assert!(!RegionVerification::new("EU", None).verified);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ExecutionStatus::Completed).unwrap(),
            serde_json::json!("completed")
        );
        assert_eq!(JobStatus::Partial.to_string(), "partial");
    }
}
