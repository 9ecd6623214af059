//! # Job Submission
//!
//! `SubmitJob` for the node: validate, sign with the node key (or admit a
//! spec the submitter already signed), then persist the job record together
//! with its `job-created` outbox entry in one batch.

use chrono::{DateTime, Utc};
use pb_01_job_envelope::{JobEnvelopeApi, SigningError, ValidationError, VerificationError};
use pb_03_outbox::{OutboxStore, StoreError, WriteBatch};
use pb_05_anchoring::AnchorResult;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use shared_crypto::Ed25519KeyPair;
use shared_types::{ExecutionStatus, JobSpec, JobStatus};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Outbox topics. The hub relays each one as the broadcast `type`.
pub mod topics {
    pub const JOB_CREATED: &str = "job-created";
    pub const JOB_STARTED: &str = "job-started";
    pub const JOB_COMPLETED: &str = "job-completed";
    /// Enough regions succeeded but under the job's success rate.
    pub const JOB_PARTIAL: &str = "job-partial";
    pub const JOB_FAILED: &str = "job-failed";
    pub const JOB_ANCHORED: &str = "job-anchored";
    pub const EXECUTION_COMPLETED: &str = "execution-completed";
    pub const EXECUTION_FAILED: &str = "execution-failed";
}

pub fn job_key(job_id: &str) -> String {
    format!("job:{job_id}")
}

pub fn execution_key(job_id: &str, region: &str) -> String {
    format!("execution:{job_id}:{region}")
}

/// Errors surfaced to job API callers. Serializes as `{code, message}`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JobError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("job {0} not found")]
    NotFound(String),

    #[error("job {0} already exists")]
    AlreadyExists(String),

    #[error("job {id} is {status}")]
    InvalidState { id: String, status: JobStatus },

    #[error("{0}")]
    Unauthorized(String),
}

impl JobError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            JobError::Validation(_) => "VALIDATION_ERROR",
            JobError::Signing(_) => "SIGNING_ERROR",
            JobError::Verification(_) => "VERIFICATION_ERROR",
            JobError::Storage(_) => "STORAGE_ERROR",
            JobError::NotFound(_) => "NOT_FOUND",
            JobError::AlreadyExists(_) => "ALREADY_EXISTS",
            JobError::InvalidState { .. } => "INVALID_STATE",
            JobError::Unauthorized(_) => "UNAUTHORIZED",
        }
    }
}

impl Serialize for JobError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = serializer.serialize_struct("JobError", 2)?;
        body.serialize_field("code", self.code())?;
        body.serialize_field("message", &self.to_string())?;
        body.end()
    }
}

/// Persisted state of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub spec: JobSpec,
    pub status: JobStatus,
    /// Terminal execution status per region, once the job has run.
    #[serde(default)]
    pub regions: BTreeMap<String, ExecutionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<AnchorResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    fn submitted(spec: JobSpec, request_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            spec,
            status: JobStatus::Submitted,
            regions: BTreeMap::new(),
            result_hash: None,
            anchor: None,
            request_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    /// Topic and data announcing the record's current status.
    pub fn announcement(&self) -> (&'static str, Value) {
        match self.status {
            JobStatus::Submitted | JobStatus::Running => (
                topics::JOB_CREATED,
                json!({
                    "id": self.spec.id,
                    "status": self.status,
                    "regions": self.spec.constraints.regions,
                }),
            ),
            JobStatus::Completed => (
                topics::JOB_COMPLETED,
                json!({ "id": self.spec.id, "regions": self.regions }),
            ),
            JobStatus::Partial => (
                topics::JOB_PARTIAL,
                json!({
                    "id": self.spec.id,
                    "status": self.status,
                    "regions": self.regions,
                }),
            ),
            JobStatus::Failed => (
                topics::JOB_FAILED,
                json!({
                    "id": self.spec.id,
                    "status": self.status,
                    "regions": self.regions,
                }),
            ),
        }
    }
}

/// Read a job record from the store.
pub fn load_job(store: &dyn OutboxStore, job_id: &str) -> Result<JobRecord, JobError> {
    let key = job_key(job_id);
    let value = store
        .get_state(&key)?
        .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
    serde_json::from_value(value).map_err(|e| {
        JobError::Storage(StoreError::Corrupt {
            key,
            message: e.to_string(),
        })
    })
}

pub struct JobsService {
    envelope: Arc<dyn JobEnvelopeApi>,
    keypair: Arc<Ed25519KeyPair>,
    store: Arc<dyn OutboxStore>,
}

impl JobsService {
    pub fn new(
        envelope: Arc<dyn JobEnvelopeApi>,
        keypair: Arc<Ed25519KeyPair>,
        store: Arc<dyn OutboxStore>,
    ) -> Self {
        Self {
            envelope,
            keypair,
            store,
        }
    }

    /// Accept a job.
    ///
    /// An unsigned spec gets defaults applied and is signed with the node
    /// key. A signed spec must pass admission (signature, submitter trust,
    /// replay window) and is stored as-is.
    pub fn submit_job(
        &self,
        mut spec: JobSpec,
        request_id: Option<String>,
    ) -> Result<JobRecord, JobError> {
        let spec = if spec.is_signed() {
            pb_01_job_envelope::check_structure(&spec)?;
            self.envelope.admit(&spec)?;
            spec
        } else {
            spec.clear_signature();
            self.envelope.validate(&mut spec)?;
            self.envelope.sign(spec, &self.keypair)?
        };

        if self.store.get_state(&job_key(&spec.id))?.is_some() {
            return Err(JobError::AlreadyExists(spec.id));
        }

        let record = JobRecord::submitted(spec, request_id);
        let (topic, data) = record.announcement();
        let mut batch = WriteBatch::new();
        batch.put_state(job_key(record.id()), &record)?;
        batch.enqueue_correlated(topic, &data, record.request_id.clone())?;
        self.store.commit(batch)?;

        info!(
            job_id = %record.id(),
            regions = record.spec.constraints.regions.len(),
            request_id = record.request_id.as_deref().unwrap_or("-"),
            "Job submitted"
        );
        Ok(record)
    }

    pub fn get_job(&self, job_id: &str) -> Result<JobRecord, JobError> {
        load_job(self.store.as_ref(), job_id)
    }

    /// Enqueue the announcement for the job's current status again, for
    /// observers that missed it. Returns the new outbox entry id.
    pub fn republish_job(
        &self,
        job_id: &str,
        request_id: Option<String>,
    ) -> Result<String, JobError> {
        let record = self.get_job(job_id)?;
        let (topic, data) = record.announcement();
        let mut batch = WriteBatch::new();
        let entry_id = batch.enqueue_correlated(topic, &data, request_id)?;
        self.store.commit(batch)?;
        info!(job_id, topic, %entry_id, "Job announcement republished");
        Ok(entry_id)
    }
}
