//! # Negotiation Service
//!
//! Drives one region through the negotiation state machine against any
//! [`ProviderNetwork`]. The probe runs once per negotiator; later
//! negotiations start directly at `DemandCreated`.

use crate::domain::demand::{
    DemandEvent, DemandSpec, ExecOutcome, ExecutionHandle, ProbeResult, ProviderOffer,
};
use crate::domain::errors::{ClientError, NegotiationError};
use crate::domain::negotiation::{Negotiation, NegotiationState};
use crate::ports::inbound::NegotiationApi;
use crate::ports::outbound::ProviderNetwork;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use shared_types::{CallContext, JobSpec};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// Delay between demand event polls.
    pub poll_interval: Duration,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Outcome of waiting on a demand's event stream.
enum OfferWait {
    Offer(ProviderOffer),
    Rejected(String),
}

pub struct Negotiator<P: ProviderNetwork> {
    network: Arc<P>,
    config: NegotiatorConfig,
    probed: RwLock<Option<ProbeResult>>,
}

impl<P: ProviderNetwork> Negotiator<P> {
    pub fn new(network: Arc<P>, config: NegotiatorConfig) -> Self {
        Self {
            network,
            config,
            probed: RwLock::new(None),
        }
    }

    pub fn network(&self) -> &Arc<P> {
        &self.network
    }

    /// Probe result from the first negotiation, if one has run.
    pub fn probe_result(&self) -> Option<ProbeResult> {
        self.probed.read().clone()
    }

    /// Poll `demand_id` until a proposal arrives, the marketplace rejects the
    /// demand, or `timeout` elapses.
    pub async fn collect_offer(
        &self,
        ctx: &CallContext,
        demand_id: &str,
        timeout: Duration,
    ) -> Result<ProviderOffer, NegotiationError> {
        let wait_ctx = ctx.child_with_timeout(timeout);
        match self.poll_events(&wait_ctx, demand_id).await {
            Ok(OfferWait::Offer(offer)) => Ok(offer),
            Ok(OfferWait::Rejected(reason)) => Err(NegotiationError::Rejected {
                demand_id: demand_id.to_string(),
                reason,
            }),
            Err(ClientError::Cancelled { .. }) => match ctx.check() {
                Err(parent) => Err(NegotiationError::Cancelled(parent)),
                Ok(()) => Err(NegotiationError::TimedOut {
                    demand_id: demand_id.to_string(),
                    waited: timeout,
                }),
            },
            Err(source) => Err(NegotiationError::Client {
                state: NegotiationState::DemandCreated,
                source,
            }),
        }
    }

    async fn poll_events(
        &self,
        ctx: &CallContext,
        demand_id: &str,
    ) -> Result<OfferWait, ClientError> {
        loop {
            for event in self.network.demand_events(ctx, demand_id).await? {
                match event {
                    DemandEvent::Proposal { proposal } => return Ok(OfferWait::Offer(proposal)),
                    DemandEvent::Rejected { reason } => return Ok(OfferWait::Rejected(reason)),
                    DemandEvent::Other => {}
                }
            }
            ctx.sleep(self.config.poll_interval)
                .await
                .map_err(|reason| ClientError::Cancelled {
                    attempts: 0,
                    reason,
                })?;
        }
    }
}

fn step_failed(state: NegotiationState) -> impl FnOnce(ClientError) -> NegotiationError {
    move |source| NegotiationError::Client { state, source }
}

/// Exe-script deploying the job's container and running its benchmark.
pub fn exec_script(spec: &JobSpec) -> Value {
    json!([
        {"deploy": {}},
        {"start": {}},
        {"run": {
            "entry_point": "/bin/sh",
            "args": ["-c", format!("run-benchmark {}", spec.benchmark.name)],
            "capture": {"stdout": {"atEnd": {}}, "stderr": {"atEnd": {}}}
        }}
    ])
}

#[async_trait]
impl<P: ProviderNetwork + 'static> NegotiationApi for Negotiator<P> {
    async fn negotiate(
        &self,
        ctx: &CallContext,
        spec: &JobSpec,
        region: &str,
    ) -> Result<ExecutionHandle, NegotiationError> {
        let mut negotiation = Negotiation::new(region);

        if self.probed.read().is_none() {
            negotiation.advance(NegotiationState::Probing);
            let hit = self
                .network
                .probe(ctx)
                .await
                .map_err(step_failed(NegotiationState::Probing))?;
            *self.probed.write() = Some(hit);
        }

        let demand = DemandSpec::for_job(spec, region);
        let demand_id = self
            .network
            .create_demand(ctx, &demand)
            .await
            .map_err(step_failed(negotiation.state()))?;
        negotiation.advance(NegotiationState::DemandCreated);

        let timeout = spec.constraints.provider_timeout();
        let offer = match self.collect_offer(ctx, &demand_id, timeout).await {
            Ok(offer) => offer,
            Err(err) => {
                match &err {
                    NegotiationError::Rejected { reason, .. } => {
                        negotiation.advance(NegotiationState::Rejected);
                        warn!(job_id = %spec.id, %region, %demand_id, %reason, "Demand rejected");
                    }
                    NegotiationError::TimedOut { .. } => {
                        negotiation.advance(NegotiationState::TimedOut);
                        warn!(job_id = %spec.id, %region, %demand_id, ?timeout, "No offer in time");
                    }
                    _ => {}
                }
                return Err(err);
            }
        };
        negotiation.advance(NegotiationState::OfferReceived);

        let agreement_id = self
            .network
            .create_agreement(ctx, &offer.proposal_id)
            .await
            .map_err(step_failed(NegotiationState::OfferReceived))?;
        let activity_id = self
            .network
            .create_activity(ctx, &agreement_id)
            .await
            .map_err(step_failed(NegotiationState::OfferReceived))?;

        info!(
            job_id = %spec.id,
            %region,
            provider = %offer.issuer_id,
            %agreement_id,
            %activity_id,
            "Provider engaged"
        );

        Ok(ExecutionHandle {
            region: region.to_string(),
            demand_id,
            offer,
            agreement_id,
            activity_id,
        })
    }

    async fn execute(
        &self,
        ctx: &CallContext,
        handle: &ExecutionHandle,
        spec: &JobSpec,
    ) -> Result<ExecOutcome, NegotiationError> {
        let run_ctx = ctx.child_with_timeout(spec.constraints.provider_timeout());
        match self
            .network
            .exec(&run_ctx, &handle.activity_id, &exec_script(spec))
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(source) => {
                if let (ClientError::Cancelled { .. }, Err(parent)) = (&source, ctx.check()) {
                    return Err(NegotiationError::Cancelled(parent));
                }
                Err(NegotiationError::Client {
                    state: NegotiationState::OfferReceived,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::Map;
    use shared_types::{BenchmarkSpec, ContainerSpec, ContextError, ExecutionConstraints};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted marketplace: each demand poll pops the next batch of events.
    #[derive(Default)]
    struct FakeNetwork {
        probes: AtomicU32,
        demands: AtomicU32,
        events: Mutex<VecDeque<Vec<DemandEvent>>>,
        demand_error: Option<ClientError>,
    }

    #[async_trait]
    impl ProviderNetwork for FakeNetwork {
        async fn probe(&self, _ctx: &CallContext) -> Result<ProbeResult, ClientError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(ProbeResult {
                matched_path: "/market-api/v1".into(),
                version_info: None,
            })
        }

        async fn create_demand(
            &self,
            _ctx: &CallContext,
            _demand: &DemandSpec,
        ) -> Result<String, ClientError> {
            let n = self.demands.fetch_add(1, Ordering::SeqCst);
            match &self.demand_error {
                Some(err) => Err(err.clone()),
                None => Ok(format!("d-{n}")),
            }
        }

        async fn demand_events(
            &self,
            _ctx: &CallContext,
            _demand_id: &str,
        ) -> Result<Vec<DemandEvent>, ClientError> {
            Ok(self.events.lock().pop_front().unwrap_or_default())
        }

        async fn create_agreement(
            &self,
            _ctx: &CallContext,
            proposal_id: &str,
        ) -> Result<String, ClientError> {
            Ok(format!("agr-{proposal_id}"))
        }

        async fn create_activity(
            &self,
            _ctx: &CallContext,
            agreement_id: &str,
        ) -> Result<String, ClientError> {
            Ok(format!("act-{agreement_id}"))
        }

        async fn exec(
            &self,
            _ctx: &CallContext,
            activity_id: &str,
            _script: &Value,
        ) -> Result<ExecOutcome, ClientError> {
            Ok(ExecOutcome {
                success: true,
                stdout: activity_id.to_string(),
                stderr: String::new(),
            })
        }
    }

    fn spec(timeout: Duration) -> JobSpec {
        let mut constraints = ExecutionConstraints::for_regions(["US"]);
        constraints.provider_timeout = Some(timeout);
        JobSpec::new(
            "job-1",
            BenchmarkSpec {
                name: "bench".into(),
                container: ContainerSpec {
                    image: "img".into(),
                    tag: None,
                },
                resources: Default::default(),
            },
            constraints,
        )
    }

    fn proposal(id: &str) -> DemandEvent {
        DemandEvent::Proposal {
            proposal: ProviderOffer {
                proposal_id: id.into(),
                issuer_id: "node-1".into(),
                properties: Map::new(),
            },
        }
    }

    fn negotiator(network: FakeNetwork) -> Negotiator<FakeNetwork> {
        Negotiator::new(
            Arc::new(network),
            NegotiatorConfig {
                poll_interval: Duration::from_millis(100),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_offer_after_empty_polls() {
        let network = FakeNetwork::default();
        network
            .events
            .lock()
            .extend([vec![], vec![DemandEvent::Other], vec![proposal("p-9")]]);
        let negotiator = negotiator(network);

        let handle = negotiator
            .negotiate(&CallContext::background(), &spec(Duration::from_secs(5)), "US")
            .await
            .unwrap();

        assert_eq!(handle.demand_id, "d-0");
        assert_eq!(handle.agreement_id, "agr-p-9");
        assert_eq!(handle.activity_id, "act-agr-p-9");
        assert!(negotiator.probe_result().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_runs_once() {
        let network = FakeNetwork::default();
        network
            .events
            .lock()
            .extend([vec![proposal("a")], vec![proposal("b")]]);
        let negotiator = negotiator(network);
        let ctx = CallContext::background();
        let job = spec(Duration::from_secs(5));

        negotiator.negotiate(&ctx, &job, "US").await.unwrap();
        negotiator.negotiate(&ctx, &job, "EU").await.unwrap();

        assert_eq!(negotiator.network().probes.load(Ordering::SeqCst), 1);
        assert_eq!(negotiator.network().demands.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_offer_times_out() {
        let negotiator = negotiator(FakeNetwork::default());
        let err = negotiator
            .negotiate(&CallContext::background(), &spec(Duration::from_secs(1)), "US")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            NegotiationError::TimedOut {
                demand_id: "d-0".into(),
                waited: Duration::from_secs(1),
            }
        );
        assert_eq!(err.outcome(), "timed_out");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_is_terminal() {
        let network = FakeNetwork::default();
        network.events.lock().push_back(vec![DemandEvent::Rejected {
            reason: "no capacity".into(),
        }]);
        let negotiator = negotiator(network);

        let err = negotiator
            .negotiate(&CallContext::background(), &spec(Duration::from_secs(5)), "US")
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::Rejected { ref reason, .. } if reason == "no capacity"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_deadline_reports_cancelled() {
        let negotiator = negotiator(FakeNetwork::default());
        let ctx = CallContext::with_timeout(Duration::from_millis(300));

        let err = negotiator
            .negotiate(&ctx, &spec(Duration::from_secs(60)), "US")
            .await
            .unwrap_err();
        assert_eq!(err, NegotiationError::Cancelled(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_demand_failure_keeps_cause() {
        let network = FakeNetwork {
            demand_error: Some(ClientError::Exhausted {
                attempts: 3,
                last: Box::new(ClientError::Transport("reset".into())),
            }),
            ..FakeNetwork::default()
        };
        let negotiator = negotiator(network);

        let err = negotiator
            .negotiate(&CallContext::background(), &spec(Duration::from_secs(5)), "US")
            .await
            .unwrap_err();
        assert_eq!(err.attempts(), Some(3));
        assert!(matches!(
            err,
            NegotiationError::Client {
                state: NegotiationState::Probing,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_execute_runs_script() {
        let network = FakeNetwork::default();
        network.events.lock().push_back(vec![proposal("p")]);
        let negotiator = negotiator(network);
        let ctx = CallContext::background();
        let job = spec(Duration::from_secs(5));

        let handle = negotiator.negotiate(&ctx, &job, "US").await.unwrap();
        let outcome = negotiator.execute(&ctx, &handle, &job).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.stdout, "act-agr-p");
    }

    #[test]
    fn test_exec_script_shape() {
        let script = exec_script(&spec(Duration::from_secs(1)));
        assert_eq!(script.as_array().unwrap().len(), 3);
        assert!(script[2]["run"]["args"][1]
            .as_str()
            .unwrap()
            .ends_with("bench"));
    }
}
