//! # End-to-End Job Flow
//!
//! One job, two regions, one of them unreachable:
//!
//! ```text
//! POST /jobs ──▶ validate (defaults) ──▶ sign ──▶ outbox(job-created)
//!                                                     │
//!                          JobRunner::run_job ◀───────┘
//!                 ┌──────────────┴──────────────┐
//!                 US                            EU
//!   probe → demand → offer → agreement    demand → 500, 500, 500
//!   → activity → exec (Ok)                (retries exhausted)
//!                 └──────────────┬──────────────┘
//!             1 of 2 succeeded, rate 0.5 → completed
//!                                │
//!   outbox(job-completed) → bus → relay → hub → observer
//!                                │
//!               anchor(sha256(result)) → verify
//! ```

#[cfg(test)]
mod tests {
    use crate::integration::serve;
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use node_runtime::{NodeRuntime, RuntimeConfig};
    use parking_lot::Mutex;
    use pb_01_job_envelope::{verify_signature, VerificationError};
    use pb_02_provider_client::{MarketplaceConfig, RetryPolicy};
    use pb_03_outbox::OutboxPublisherApi;
    use pb_04_broadcast_hub::Registration;
    use pb_05_anchoring::{AnchorApi, AnchorResult};
    use serde_json::{json, Value};
    use shared_types::{CallContext, JobSpec, DEFAULT_PROVIDER_TIMEOUT};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    const DEMAND_ATTEMPTS: u32 = 3;

    /// Marketplace where every EU demand fails with a 500.
    #[derive(Clone, Default)]
    struct Marketplace {
        demand_calls: Arc<Mutex<BTreeMap<String, u32>>>,
    }

    async fn create_demand(
        State(market): State<Marketplace>,
        Json(demand): Json<Value>,
    ) -> Response {
        let region = demand["properties"]["beacon.job.region"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        *market.demand_calls.lock().entry(region.clone()).or_default() += 1;
        if region == "EU" {
            return (StatusCode::INTERNAL_SERVER_ERROR, "eu market down").into_response();
        }
        let id = format!("d-{}", region.to_lowercase());
        (StatusCode::CREATED, Json(json!({ "demandId": id }))).into_response()
    }

    async fn demand_events(Path(demand_id): Path<String>) -> Json<Value> {
        Json(json!([{
            "eventType": "ProposalEvent",
            "proposal": {
                "proposalId": format!("{demand_id}-p1"),
                "issuerId": "provider-us-1",
                "properties": {"golem.node.geo.region": "US"}
            }
        }]))
    }

    fn marketplace_router(market: Marketplace) -> Router {
        Router::new()
            .route("/market-api/v1", get(|| async { Json(json!({"version": "mock"})) }))
            .route("/market-api/v1/demands", post(create_demand))
            .route("/market-api/v1/demands/:id/events", get(demand_events))
            .route(
                "/market-api/v1/agreements",
                post(|| async { Json(json!({"agreementId": "ag-1"})) }),
            )
            .route(
                "/activity-api/v1/activity",
                post(|| async { Json(json!({"activityId": "act-1"})) }),
            )
            .route(
                "/activity-api/v1/activity/act-1/exec",
                post(|| async { Json(json!("batch-1")) }),
            )
            .route(
                "/activity-api/v1/activity/act-1/exec/batch-1",
                get(|| async {
                    Json(json!([
                        {"index": 0, "result": "Ok", "stdout": "score=42", "isBatchFinished": true}
                    ]))
                }),
            )
            .with_state(market)
    }

    fn runtime_config(marketplace_url: String) -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.server.signing_seed = Some("2a".repeat(32));
        config.marketplace = MarketplaceConfig::new(marketplace_url);
        config.marketplace.retry = RetryPolicy::fixed(DEMAND_ATTEMPTS, Duration::from_millis(20));
        config.marketplace.poll_interval = Duration::from_millis(10);
        config.outbox.poll_interval = Duration::from_millis(10);
        config
    }

    /// Next broadcast of `kind`, skipping everything else.
    async fn next_of_kind(observer: &mut Registration, kind: &str) -> Value {
        let wait = async {
            loop {
                let frame = observer.receiver.recv().await.expect("hub closed observer");
                let message: Value = serde_json::from_str(&frame).unwrap();
                if message["type"] == kind {
                    return message;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(10), wait)
            .await
            .unwrap_or_else(|_| panic!("no {kind} broadcast"))
    }

    #[tokio::test]
    async fn test_job_completes_with_one_region_down() {
        let market = Marketplace::default();
        let demand_calls = market.demand_calls.clone();
        let market_url = serve(marketplace_router(market)).await;

        let mut runtime = NodeRuntime::new(runtime_config(market_url)).unwrap();
        runtime.start();
        let mut observer = runtime.hub().register(None).await.unwrap();
        let api = serve(runtime.router()).await;

        // Unsigned, provider_timeout left unset.
        let submitted = reqwest::Client::new()
            .post(format!("{api}/jobs"))
            .header("x-request-id", "req-e2e")
            .json(&json!({
                "id": "job-1",
                "version": "v1",
                "benchmark": {"name": "cpu-score", "container": {"image": "beacon/bench", "tag": "1.0"}},
                "constraints": {"regions": ["US", "EU"], "min_regions": 1, "min_success_rate": 0.5}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(submitted.status(), reqwest::StatusCode::ACCEPTED);
        assert_eq!(submitted.json::<Value>().await.unwrap()["id"], "job-1");

        let completed = next_of_kind(&mut observer, "job-completed").await;
        assert_eq!(
            completed["data"],
            json!({"id": "job-1", "regions": {"US": "completed", "EU": "failed"}})
        );
        assert_eq!(completed["request_id"], "req-e2e");

        let anchored = next_of_kind(&mut observer, "job-anchored").await;
        assert_eq!(anchored["data"]["id"], "job-1");

        // EU gave up after the configured attempts; US needed one demand.
        {
            let calls = demand_calls.lock();
            assert_eq!(calls.get("EU"), Some(&DEMAND_ATTEMPTS));
            assert_eq!(calls.get("US"), Some(&1));
        }

        let record: Value = reqwest::get(format!("{api}/jobs/job-1"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(record["status"], "completed");
        assert_eq!(record["regions"], json!({"US": "completed", "EU": "failed"}));

        // Defaults were filled in before signing and the stored spec verifies.
        let mut spec: JobSpec = serde_json::from_value(record["spec"].clone()).unwrap();
        assert_eq!(spec.constraints.provider_timeout, Some(DEFAULT_PROVIDER_TIMEOUT));
        assert_eq!(spec.constraints.min_success_rate, Some(0.5));
        assert!(spec.metadata.timestamp.is_some());
        assert!(spec.metadata.nonce.is_some());
        let signer = verify_signature(&spec).unwrap();
        assert_eq!(signer, runtime.keypair().public_key());

        spec.constraints.min_regions = Some(2);
        assert!(matches!(
            verify_signature(&spec),
            Err(VerificationError::SignatureMismatch)
        ));

        let anchor: AnchorResult = serde_json::from_value(record["anchor"].clone()).unwrap();
        assert_eq!(anchor.anchored_hash, record["result_hash"].as_str().unwrap());
        let ctx = CallContext::background();
        assert!(runtime.anchor().verify_anchor(&ctx, &anchor).await.unwrap());

        // Every committed announcement leaves the outbox.
        let drained = async {
            loop {
                if runtime.publisher().unpublished_stats().unwrap().count == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), drained)
            .await
            .unwrap();

        runtime.shutdown().await;
    }
}
