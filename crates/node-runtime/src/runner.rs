//! # Job Runner
//!
//! Runs a submitted job to completion:
//!
//! ```text
//!   load ──▶ running ──▶ negotiate + execute per region (concurrently)
//!                               │  each: execution row + execution-{completed,failed}
//!                               ▼
//!                          aggregate ──▶ job row + job-{completed,partial,failed}
//!                               │
//!                               ▼
//!                     anchor sha256(result) ──▶ job row + job-anchored
//! ```
//!
//! A region that fails only degrades the job. Whether the job still counts
//! as completed is decided by its own `min_regions` and `min_success_rate`.

use crate::jobs::{execution_key, job_key, load_job, topics, JobError, JobRecord};
use beacon_telemetry::{ANCHORS, NEGOTIATION_ATTEMPTS};
use chrono::Utc;
use futures::future::join_all;
use pb_02_provider_client::NegotiationApi;
use pb_03_outbox::{OutboxStore, WriteBatch};
use pb_05_anchoring::{AnchorApi, AnchorResult};
use serde::Serialize;
use serde_json::json;
use shared_crypto::sha256_hex;
use shared_types::{
    CallContext, Execution, ExecutionConstraints, ExecutionStatus, JobSpec, JobStatus,
    RegionVerification,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub status: JobStatus,
    pub regions: BTreeMap<String, ExecutionStatus>,
    pub result_hash: String,
    pub anchor: Option<AnchorResult>,
}

/// Job status from the terminal executions of its regions.
///
/// Fewer successes than `min_regions` is a failure. Enough regions but a
/// success rate under `min_success_rate` is `Partial`.
pub fn aggregate(constraints: &ExecutionConstraints, executions: &[Execution]) -> JobStatus {
    let total = executions.len();
    let succeeded = executions
        .iter()
        .filter(|e| e.status == ExecutionStatus::Completed)
        .count();
    if total == 0 || succeeded == 0 || (succeeded as u64) < u64::from(constraints.min_regions()) {
        return JobStatus::Failed;
    }
    let rate = succeeded as f64 / total as f64;
    if rate >= constraints.min_success_rate() {
        JobStatus::Completed
    } else {
        JobStatus::Partial
    }
}

/// Content hash of a job outcome: sha256 over `{id, status, regions}` as
/// JSON, with regions in key order.
pub fn result_hash(record: &JobRecord) -> Result<String, JobError> {
    let outcome = json!({
        "id": record.spec.id,
        "status": record.status,
        "regions": record.regions,
    });
    let bytes = serde_json::to_vec(&outcome).map_err(pb_03_outbox::StoreError::from)?;
    Ok(sha256_hex(&bytes))
}

pub struct JobRunner {
    negotiator: Arc<dyn NegotiationApi>,
    store: Arc<dyn OutboxStore>,
    anchor: Arc<dyn AnchorApi>,
}

impl JobRunner {
    pub fn new(
        negotiator: Arc<dyn NegotiationApi>,
        store: Arc<dyn OutboxStore>,
        anchor: Arc<dyn AnchorApi>,
    ) -> Self {
        Self {
            negotiator,
            store,
            anchor,
        }
    }

    /// Run a `submitted` job. Anchoring failure is logged and leaves the job
    /// unanchored; it does not change the job's status.
    pub async fn run_job(&self, ctx: &CallContext, job_id: &str) -> Result<JobReport, JobError> {
        let mut record = load_job(self.store.as_ref(), job_id)?;
        if record.status != JobStatus::Submitted {
            return Err(JobError::InvalidState {
                id: job_id.to_string(),
                status: record.status,
            });
        }

        record.status = JobStatus::Running;
        record.updated_at = Utc::now();
        let mut batch = WriteBatch::new();
        batch.put_state(job_key(job_id), &record)?;
        batch.enqueue_correlated(
            topics::JOB_STARTED,
            &json!({ "id": job_id, "regions": record.spec.constraints.regions }),
            record.request_id.clone(),
        )?;
        self.store.commit(batch)?;
        info!(job_id, regions = record.spec.constraints.regions.len(), "Job started");

        let spec = &record.spec;
        let runs = spec
            .constraints
            .regions
            .iter()
            .map(|region| self.run_region(ctx, spec, region, record.request_id.clone()));
        let results = join_all(runs).await;

        let mut regions = BTreeMap::new();
        let mut executions = Vec::with_capacity(results.len());
        let mut unrecorded = None;
        for (region, result) in spec.constraints.regions.iter().zip(results) {
            match result {
                Ok(execution) => {
                    regions.insert(region.clone(), execution.status);
                    executions.push(execution);
                }
                Err(e) => {
                    error!(job_id, region = %region, error = %e, "Execution not recorded");
                    regions.insert(region.clone(), ExecutionStatus::Failed);
                    if unrecorded.is_none() {
                        unrecorded = Some(e);
                    }
                }
            }
        }

        // A region whose outcome never reached the store fails the job, so
        // the record does not stay running.
        if let Some(e) = unrecorded {
            record.status = JobStatus::Failed;
            record.regions = regions;
            record.updated_at = Utc::now();
            if let Err(commit) = self.commit_status(&record) {
                error!(job_id, error = %commit, "Could not mark job failed");
            }
            return Err(e);
        }

        record.status = aggregate(&spec.constraints, &executions);
        record.regions = regions;
        let hash = result_hash(&record)?;
        record.result_hash = Some(hash.clone());
        record.updated_at = Utc::now();
        self.commit_status(&record)?;
        info!(job_id, status = %record.status, result_hash = %hash, "Job finished");

        let anchor = match self.anchor.anchor_hash(ctx, &hash).await {
            Ok(anchor) => {
                ANCHORS.with_label_values(&[anchor.network.as_str(), "ok"]).inc();
                Some(anchor)
            }
            Err(e) => {
                ANCHORS.with_label_values(&["none", e.outcome()]).inc();
                warn!(job_id, error = %e, "Result not anchored");
                None
            }
        };

        if let Some(anchor) = &anchor {
            record.anchor = Some(anchor.clone());
            record.updated_at = Utc::now();
            let mut batch = WriteBatch::new();
            batch.put_state(job_key(job_id), &record)?;
            batch.enqueue_correlated(
                topics::JOB_ANCHORED,
                &json!({
                    "id": job_id,
                    "result_hash": hash,
                    "network": anchor.network,
                    "tx_handle": anchor.tx_handle,
                }),
                record.request_id.clone(),
            )?;
            self.store.commit(batch)?;
        }

        Ok(JobReport {
            job_id: job_id.to_string(),
            status: record.status,
            regions: record.regions,
            result_hash: hash,
            anchor,
        })
    }

    /// Persist the record with the announcement for its status.
    fn commit_status(&self, record: &JobRecord) -> Result<(), JobError> {
        let (topic, data) = record.announcement();
        let mut batch = WriteBatch::new();
        batch.put_state(job_key(record.id()), record)?;
        batch.enqueue_correlated(topic, &data, record.request_id.clone())?;
        self.store.commit(batch)?;
        Ok(())
    }

    /// Negotiate and execute in one region, then persist the execution with
    /// its announcement.
    async fn run_region(
        &self,
        ctx: &CallContext,
        spec: &JobSpec,
        region: &str,
        request_id: Option<String>,
    ) -> Result<Execution, JobError> {
        let mut execution = Execution::pending(&spec.id, region);

        match self.negotiator.negotiate(ctx, spec, region).await {
            Ok(handle) => {
                execution.provider_id = Some(handle.offer.issuer_id.clone());
                execution.region_check =
                    RegionVerification::new(region, handle.offer.region().map(str::to_owned));
                execution.advance(ExecutionStatus::Running);

                match self.negotiator.execute(ctx, &handle, spec).await {
                    Ok(outcome) => {
                        execution.output = Some(json!({
                            "stdout": outcome.stdout,
                            "stderr": outcome.stderr,
                        }));
                        if outcome.success {
                            execution.advance(ExecutionStatus::Completed);
                        } else {
                            execution.error = Some("command batch reported failure".to_string());
                            execution.advance(ExecutionStatus::Failed);
                        }
                    }
                    Err(e) => {
                        warn!(job_id = %spec.id, region, error = %e, "Execution failed");
                        execution.error = Some(e.to_string());
                        execution.advance(ExecutionStatus::Failed);
                    }
                }
                NEGOTIATION_ATTEMPTS.with_label_values(&["completed"]).inc();
            }
            Err(e) => {
                NEGOTIATION_ATTEMPTS.with_label_values(&[e.outcome()]).inc();
                warn!(
                    job_id = %spec.id,
                    region,
                    attempts = ?e.attempts(),
                    error = %e,
                    "Negotiation failed"
                );
                execution.error = Some(e.to_string());
                execution.advance(ExecutionStatus::Failed);
            }
        }

        let topic = if execution.status == ExecutionStatus::Completed {
            topics::EXECUTION_COMPLETED
        } else {
            topics::EXECUTION_FAILED
        };
        let mut batch = WriteBatch::new();
        batch.put_state(execution_key(&spec.id, region), &execution)?;
        batch.enqueue_correlated(
            topic,
            &json!({
                "id": spec.id,
                "execution_id": execution.id,
                "region": region,
                "status": execution.status,
                "provider_id": execution.provider_id,
                "region_verified": execution.region_check.verified,
            }),
            request_id,
        )?;
        self.store.commit(batch)?;
        Ok(execution)
    }
}
