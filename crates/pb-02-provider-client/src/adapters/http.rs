//! # Marketplace HTTP Adapter
//!
//! reqwest-backed [`ProviderNetwork`]. Every request goes through
//! [`MarketplaceClient::execute`], which owns the retry loop:
//!
//! - 5xx, 429 and transport errors are retried with exponential backoff
//! - a `Retry-After` header on 429/503 replaces the computed delay
//! - 404 surfaces as [`ClientError::NotFound`], other 4xx immediately
//! - the caller's deadline bounds both the in-flight request and the backoff
//!   sleep; when it fires no further attempt is made

use crate::domain::demand::{DemandEvent, DemandSpec, ExecOutcome, ProbeResult};
use crate::domain::errors::ClientError;
use crate::domain::retry::{parse_retry_after, RetryPolicy};
use crate::ports::outbound::ProviderNetwork;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use shared_types::CallContext;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fallback mount points tried after the configured market base.
pub const PROBE_FALLBACKS: [&str; 3] = ["/ya-market/v1", "/market/v1", "/market"];

#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    /// Scheme, host and port, without a trailing slash.
    pub base_url: String,
    /// Bearer token sent on every request.
    pub app_key: Option<String>,
    /// Market API mount point; replaced by the probe hit once discovered.
    pub market_base: String,
    pub activity_base: String,
    /// Per-request timeout, independent of the caller's deadline.
    pub request_timeout: Duration,
    /// Delay between event and exec-result polls.
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7465".to_string(),
            app_key: None,
            market_base: "/market-api/v1".to_string(),
            activity_base: "/activity-api/v1".to_string(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            retry: RetryPolicy::default(),
        }
    }
}

impl MarketplaceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Ordered, de-duplicated probe candidates, each with a leading slash.
    pub fn probe_candidates(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(PROBE_FALLBACKS.len() + 1);
        let configured = std::iter::once(self.market_base.as_str());
        for raw in configured.chain(PROBE_FALLBACKS) {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let path = if raw.starts_with('/') {
                raw.to_string()
            } else {
                format!("/{raw}")
            };
            if !out.contains(&path) {
                out.push(path);
            }
        }
        out
    }
}

/// HTTP client for the compute marketplace.
pub struct MarketplaceClient {
    http: Client,
    config: MarketplaceConfig,
    market_base: RwLock<String>,
}

impl MarketplaceClient {
    pub fn new(config: MarketplaceConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            market_base: RwLock::new(config.market_base.clone()),
            http,
            config,
        })
    }

    pub fn config(&self) -> &MarketplaceConfig {
        &self.config
    }

    /// Market mount point currently in use.
    pub fn market_base(&self) -> String {
        self.market_base.read().clone()
    }

    fn market_url(&self, path: &str) -> String {
        format!("{}{}{}", self.config.base_url, self.market_base.read(), path)
    }

    fn activity_url(&self, path: &str) -> String {
        format!("{}{}{}", self.config.base_url, self.config.activity_base, path)
    }

    /// Send one logical request, retrying per `policy`. Returns the status and
    /// body of the first 2xx response.
    async fn execute(
        &self,
        ctx: &CallContext,
        policy: &RetryPolicy,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, String), ClientError> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if let Err(reason) = ctx.check() {
                return Err(ClientError::Cancelled {
                    attempts: attempt,
                    reason,
                });
            }
            attempt += 1;

            let err = match ctx.run(self.send_once(method.clone(), url, body)).await {
                Err(reason) => {
                    debug!(%url, attempt, %reason, "Request abandoned");
                    return Err(ClientError::Cancelled {
                        attempts: attempt,
                        reason,
                    });
                }
                Ok(Ok(ok)) => return Ok(ok),
                Ok(Err(err)) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!(%url, attempts = attempt, error = %err, "Request failed on final attempt");
                return Err(ClientError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = policy.backoff(attempt, err.retry_after());
            warn!(
                %url,
                attempt,
                backoff_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying marketplace request"
            );
            if let Err(reason) = ctx.sleep(delay).await {
                return Err(ClientError::Cancelled {
                    attempts: attempt,
                    reason,
                });
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, String), ClientError> {
        let mut request = self.http.request(method, url);
        if let Some(key) = &self.config.app_key {
            request = request.bearer_auth(key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let retry_after = retry_after_hint(status, response.headers());
        let text = response.text().await?;

        if status.is_success() {
            return Ok((status, text));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(url.to_string()));
        }
        Err(ClientError::Http {
            status: status.as_u16(),
            body: text,
            retry_after,
        })
    }

    async fn exec_results(
        &self,
        ctx: &CallContext,
        activity_id: &str,
        batch_id: &str,
    ) -> Result<Vec<ExeCommandResult>, ClientError> {
        let url = self.activity_url(&format!("/activity/{activity_id}/exec/{batch_id}"));
        let (_, body) = self
            .execute(ctx, &self.config.retry, Method::GET, &url, None)
            .await?;
        serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

fn retry_after_hint(status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
    if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::SERVICE_UNAVAILABLE {
        return None;
    }
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    parse_retry_after(value, Utc::now())
}

/// Accepts `{"demandId": ".."}`, a JSON string, or a bare id.
fn parse_demand_id(body: &str) -> Result<String, ClientError> {
    let id = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("demandId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::InvalidResponse("missing demandId".into()))?,
        Ok(Value::String(id)) => id,
        _ => body.trim().trim_matches('"').to_string(),
    };
    if id.is_empty() {
        return Err(ClientError::InvalidResponse("empty demand id".into()));
    }
    Ok(id)
}

fn required_field(body: &str, field: &str) -> Result<String, ClientError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::InvalidResponse(format!("missing {field}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExeCommandResult {
    #[serde(default)]
    result: String,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    is_batch_finished: bool,
}

/// HTTP status behind a failed call, looking through retry exhaustion.
fn response_status(err: &ClientError) -> Option<u16> {
    match err {
        ClientError::NotFound(_) => Some(404),
        ClientError::Http { status, .. } => Some(*status),
        ClientError::Exhausted { last, .. } => response_status(last),
        _ => None,
    }
}

#[async_trait]
impl ProviderNetwork for MarketplaceClient {
    async fn probe(&self, ctx: &CallContext) -> Result<ProbeResult, ClientError> {
        // One attempt per candidate; the next candidate is the retry.
        let single = RetryPolicy {
            max_attempts: 1,
            ..self.config.retry.clone()
        };
        let mut last_url = String::new();
        let mut last_status = None;

        for candidate in self.config.probe_candidates() {
            let url = format!("{}{}", self.config.base_url, candidate);
            last_url = url.clone();

            match self.execute(ctx, &single, Method::GET, &url, None).await {
                Ok((status, body)) if status == StatusCode::OK => {
                    let version_info = serde_json::from_str(&body).ok();
                    info!(matched_path = %candidate, "Marketplace probe hit");
                    *self.market_base.write() = candidate.clone();
                    return Ok(ProbeResult {
                        matched_path: candidate,
                        version_info,
                    });
                }
                Ok((status, _)) => last_status = Some(status.as_u16()),
                Err(cancelled @ ClientError::Cancelled { .. }) => return Err(cancelled),
                Err(err) => match response_status(&err) {
                    Some(status) => last_status = Some(status),
                    None => debug!(%url, error = %err, "Probe candidate failed"),
                },
            }
        }

        warn!(%last_url, ?last_status, "Marketplace probe failed");
        Err(ClientError::ProbeFailed {
            last_url,
            last_status,
        })
    }

    async fn create_demand(
        &self,
        ctx: &CallContext,
        demand: &DemandSpec,
    ) -> Result<String, ClientError> {
        let url = self.market_url("/demands");
        let payload = serde_json::to_value(demand)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        let (_, body) = self
            .execute(ctx, &self.config.retry, Method::POST, &url, Some(&payload))
            .await?;

        let demand_id = parse_demand_id(&body)?;
        info!(%demand_id, "Demand created");
        Ok(demand_id)
    }

    async fn demand_events(
        &self,
        ctx: &CallContext,
        demand_id: &str,
    ) -> Result<Vec<DemandEvent>, ClientError> {
        let url = self.market_url(&format!("/demands/{demand_id}/events"));
        let (_, body) = self
            .execute(ctx, &self.config.retry, Method::GET, &url, None)
            .await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    async fn create_agreement(
        &self,
        ctx: &CallContext,
        proposal_id: &str,
    ) -> Result<String, ClientError> {
        let url = self.market_url("/agreements");
        let valid_to = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
        let payload = json!({ "proposalId": proposal_id, "validTo": valid_to });
        let (_, body) = self
            .execute(ctx, &self.config.retry, Method::POST, &url, Some(&payload))
            .await?;
        required_field(&body, "agreementId")
    }

    async fn create_activity(
        &self,
        ctx: &CallContext,
        agreement_id: &str,
    ) -> Result<String, ClientError> {
        let url = self.activity_url("/activity");
        let payload = json!({ "agreementId": agreement_id });
        let (_, body) = self
            .execute(ctx, &self.config.retry, Method::POST, &url, Some(&payload))
            .await?;
        required_field(&body, "activityId")
    }

    async fn exec(
        &self,
        ctx: &CallContext,
        activity_id: &str,
        script: &Value,
    ) -> Result<ExecOutcome, ClientError> {
        let url = self.activity_url(&format!("/activity/{activity_id}/exec"));
        let payload = json!({ "text": script.to_string() });
        let (_, body) = self
            .execute(ctx, &self.config.retry, Method::POST, &url, Some(&payload))
            .await?;
        let batch_id = parse_demand_id(&body)?;

        loop {
            let results = self.exec_results(ctx, activity_id, &batch_id).await?;
            if results.iter().any(|r| r.is_batch_finished) {
                let success = results.iter().all(|r| r.result.eq_ignore_ascii_case("ok"));
                let stdout: Vec<&str> = results.iter().filter_map(|r| r.stdout.as_deref()).collect();
                let stderr: Vec<&str> = results.iter().filter_map(|r| r.stderr.as_deref()).collect();
                return Ok(ExecOutcome {
                    success,
                    stdout: stdout.join("\n"),
                    stderr: stderr.join("\n"),
                });
            }
            ctx.sleep(self.config.poll_interval)
                .await
                .map_err(|reason| ClientError::Cancelled {
                    attempts: 1,
                    reason,
                })?;
        }
    }
}
