//! # Node HTTP Surface
//!
//! Role gating, `{code, message}` error bodies and the diagnostic routes of
//! a running node. The marketplace is unreachable here, so submitted jobs
//! fail in the background without affecting the responses under test.

#[cfg(test)]
mod tests {
    use crate::integration::serve;
    use node_runtime::{NodeRuntime, RuntimeConfig};
    use pb_01_job_envelope::{sign, validate};
    use pb_02_provider_client::{MarketplaceConfig, RetryPolicy};
    use reqwest::{Client, StatusCode};
    use serde_json::{json, Value};
    use shared_crypto::Ed25519KeyPair;
    use shared_types::{BenchmarkSpec, ContainerSpec, ExecutionConstraints, JobSpec};
    use std::time::Duration;

    const ADMIN: &str = "admin-secret";
    const OPERATOR: &str = "operator-secret";

    fn job(id: &str) -> Value {
        json!({
            "id": id,
            "version": "v1",
            "benchmark": {"name": "cpu-score", "container": {"image": "beacon/bench"}},
            "constraints": {"regions": ["US"]}
        })
    }

    async fn start(allowed_keys: Vec<String>) -> (NodeRuntime, String) {
        let mut config = RuntimeConfig::default();
        config.server.signing_seed = Some("5c".repeat(32));
        config.marketplace = MarketplaceConfig::new("http://127.0.0.1:9");
        config.marketplace.retry = RetryPolicy::fixed(1, Duration::from_millis(1));
        config.auth.admin_tokens = vec![ADMIN.into()];
        config.auth.operator_tokens = vec![OPERATOR.into()];
        config.auth.allowed_submitter_keys = allowed_keys;

        let mut runtime = NodeRuntime::new(config).unwrap();
        runtime.start();
        let api = serve(runtime.router()).await;
        (runtime, api)
    }

    #[tokio::test]
    async fn test_submit_requires_operator() {
        let (runtime, api) = start(Vec::new()).await;
        let http = Client::new();

        let anonymous = http.post(format!("{api}/jobs")).json(&job("job-a")).send().await.unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
        let body: Value = anonymous.json().await.unwrap();
        assert_eq!(body["code"], "UNAUTHORIZED");

        let accepted = http
            .post(format!("{api}/jobs"))
            .bearer_auth(OPERATOR)
            .json(&job("job-a"))
            .send()
            .await
            .unwrap();
        assert_eq!(accepted.status(), StatusCode::ACCEPTED);

        // Admin outranks operator.
        let as_admin = http
            .post(format!("{api}/jobs"))
            .bearer_auth(ADMIN)
            .json(&job("job-b"))
            .send()
            .await
            .unwrap();
        assert_eq!(as_admin.status(), StatusCode::ACCEPTED);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_error_bodies() {
        let (runtime, api) = start(Vec::new()).await;
        let http = Client::new();

        let mut invalid = job("job-c");
        invalid["benchmark"]["container"]["image"] = json!("");
        let rejected = http
            .post(format!("{api}/jobs"))
            .bearer_auth(OPERATOR)
            .json(&invalid)
            .send()
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        let body: Value = rejected.json().await.unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["message"].as_str().unwrap().contains("image"));

        for expected in [StatusCode::ACCEPTED, StatusCode::CONFLICT] {
            let response = http
                .post(format!("{api}/jobs"))
                .bearer_auth(OPERATOR)
                .json(&job("job-d"))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), expected);
        }

        let missing = reqwest::get(format!("{api}/jobs/no-such-job")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.json::<Value>().await.unwrap()["code"], "NOT_FOUND");

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_presigned_spec_from_untrusted_key_is_forbidden() {
        let trusted = Ed25519KeyPair::from_seed([1u8; 32]);
        let stranger = Ed25519KeyPair::from_seed([2u8; 32]);
        let (runtime, api) = start(vec![trusted.public_key().to_base64()]).await;
        let http = Client::new();

        let presigned = |id: &str, key: &Ed25519KeyPair| {
            let mut spec = JobSpec::new(
                id,
                BenchmarkSpec {
                    name: "cpu-score".into(),
                    container: ContainerSpec {
                        image: "beacon/bench".into(),
                        tag: None,
                    },
                    resources: Default::default(),
                },
                ExecutionConstraints::for_regions(["US"]),
            );
            validate(&mut spec).unwrap();
            sign(spec, key).unwrap()
        };

        let forbidden = http
            .post(format!("{api}/jobs"))
            .bearer_auth(OPERATOR)
            .json(&presigned("job-e", &stranger))
            .send()
            .await
            .unwrap();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            forbidden.json::<Value>().await.unwrap()["code"],
            "VERIFICATION_ERROR"
        );

        let admitted = http
            .post(format!("{api}/jobs"))
            .bearer_auth(OPERATOR)
            .json(&presigned("job-f", &trusted))
            .send()
            .await
            .unwrap();
        assert_eq!(admitted.status(), StatusCode::ACCEPTED);

        // Stored exactly as signed by the submitter.
        let record: Value = reqwest::get(format!("{api}/jobs/job-f"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(record["spec"]["public_key"], trusted.public_key().to_base64());

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_admin_routes_and_diagnostics() {
        let (runtime, api) = start(Vec::new()).await;
        let http = Client::new();

        let health: Value = reqwest::get(format!("{api}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["observers"], 0);

        let denied = http
            .get(format!("{api}/observers"))
            .bearer_auth(OPERATOR)
            .send()
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let _observer = runtime.hub().register(Some("dash-1".into())).await.unwrap();
        let listed: Value = http
            .get(format!("{api}/observers"))
            .bearer_auth(ADMIN)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["observers"][0]["correlation_id"], "dash-1");

        let republish_denied = http
            .post(format!("{api}/jobs/job-g/republish"))
            .bearer_auth(OPERATOR)
            .send()
            .await
            .unwrap();
        assert_eq!(republish_denied.status(), StatusCode::UNAUTHORIZED);

        let metrics = reqwest::get(format!("{api}/metrics"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(metrics.contains("beacon_hub_connections"));

        runtime.shutdown().await;
    }
}
