//! # HTTP Surface
//!
//! | Route | Role | Purpose |
//! |-------|------|---------|
//! | `GET /ws` | any | observer upgrade (broadcast hub) |
//! | `GET /health` | any | liveness plus observer and backlog counts |
//! | `GET /metrics` | any | Prometheus text exposition |
//! | `POST /jobs` | operator | `SubmitJob`; the run starts in the background |
//! | `GET /jobs/:id` | any | stored job record |
//! | `POST /jobs/:id/republish` | admin | re-announce the job's current status |
//! | `GET /observers` | admin | connected observers |
//!
//! Errors are `{code, message}` JSON bodies.

use crate::auth::{authorize, Role};
use crate::config::AuthConfig;
use crate::jobs::{JobError, JobsService};
use crate::runner::JobRunner;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use beacon_telemetry::{
    advance_counter, encode_metrics, HUB_BROADCASTS, HUB_CONNECTIONS, HUB_DROPPED, HUB_EVICTED,
    OUTBOX_PUBLISHED, OUTBOX_PUBLISH_ERRORS, OUTBOX_UNPUBLISHED,
};
use pb_01_job_envelope::{SigningError, VerificationError};
use pb_03_outbox::{OutboxPublisher, OutboxPublisherApi};
use pb_04_broadcast_hub::{hub_router, Broadcaster, HubHandle, REQUEST_ID_HEADER};
use serde_json::{json, Value};
use shared_types::{CallContext, JobSpec};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobsService>,
    pub runner: Arc<JobRunner>,
    pub hub: HubHandle,
    pub publisher: Arc<OutboxPublisher>,
    pub auth: AuthConfig,
}

pub fn router(state: AppState) -> Router {
    let hub = state.hub.clone();
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/jobs", post(submit_job))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/republish", post(republish_job))
        .route("/observers", get(observers))
        .with_state(state)
        .merge(hub_router(hub))
}

impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        let status = match &self {
            JobError::Validation(_) | JobError::Signing(SigningError::Invalid(_)) => {
                StatusCode::BAD_REQUEST
            }
            JobError::Verification(VerificationError::UntrustedKey(_)) => StatusCode::FORBIDDEN,
            JobError::Verification(_) => StatusCode::UNPROCESSABLE_ENTITY,
            JobError::NotFound(_) => StatusCode::NOT_FOUND,
            JobError::AlreadyExists(_) | JobError::InvalidState { .. } => StatusCode::CONFLICT,
            JobError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            JobError::Signing(_) | JobError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn require(headers: &HeaderMap, auth: &AuthConfig, role: Role) -> Result<(), JobError> {
    authorize(headers, auth, role).map(|_| ()).map_err(|held| {
        JobError::Unauthorized(format!(
            "{} role required, caller is {}",
            role.as_str(),
            held.as_str()
        ))
    })
}

/// Copy hub and outbox counters into the Prometheus registry.
pub fn sync_metrics(hub: &HubHandle, publisher: &OutboxPublisher) {
    let hub_counters = hub.counters();
    advance_counter(&HUB_BROADCASTS, hub_counters.broadcasts);
    advance_counter(&HUB_DROPPED, hub_counters.dropped);
    advance_counter(&HUB_EVICTED, hub_counters.evicted);
    HUB_CONNECTIONS.set(hub.connection_count() as i64);

    let outbox = publisher.counters();
    advance_counter(&OUTBOX_PUBLISHED, outbox.published);
    advance_counter(&OUTBOX_PUBLISH_ERRORS, outbox.errors);
    if let Ok(stats) = publisher.unpublished_stats() {
        OUTBOX_UNPUBLISHED.set(stats.count as i64);
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let backlog = state.publisher.unpublished_stats().ok();
    Json(json!({
        "status": "ok",
        "observers": state.hub.connection_count(),
        "outbox_unpublished": backlog.map(|s| s.count),
        "oldest_unpublished": backlog.and_then(|s| s.oldest_created_at),
    }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    sync_metrics(&state.hub, &state.publisher);
    match encode_metrics() {
        Ok(text) => text.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn submit_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(spec): Json<JobSpec>,
) -> Result<(StatusCode, Json<Value>), JobError> {
    require(&headers, &state.auth, Role::Operator)?;
    let record = state.jobs.submit_job(spec, request_id(&headers))?;
    let job_id = record.id().to_string();

    let runner = state.runner.clone();
    let run_id = job_id.clone();
    tokio::spawn(async move {
        match runner.run_job(&CallContext::background(), &run_id).await {
            Ok(report) => info!(job_id = %run_id, status = %report.status, "Job run finished"),
            Err(e) => error!(job_id = %run_id, code = e.code(), error = %e, "Job run failed"),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "id": job_id }))))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, JobError> {
    let record = state.jobs.get_job(&id)?;
    let body = serde_json::to_value(&record).map_err(pb_03_outbox::StoreError::from)?;
    Ok(Json(body))
}

async fn republish_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Value>), JobError> {
    require(&headers, &state.auth, Role::Admin)?;
    let entry_id = state.jobs.republish_job(&id, request_id(&headers))?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "id": id, "entry_id": entry_id }))))
}

async fn observers(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, JobError> {
    require(&headers, &state.auth, Role::Admin)?;
    let observers: Vec<Value> = state
        .hub
        .observers()
        .into_iter()
        .map(|o| {
            json!({
                "id": o.id.to_string(),
                "correlation_id": o.correlation_id,
                "state": format!("{:?}", o.state).to_lowercase(),
                "connected_at": o.connected_at,
            })
        })
        .collect();
    Ok(Json(json!({ "count": observers.len(), "observers": observers })))
}
