//! # Node Runtime
//!
//! Builds every subsystem from a [`RuntimeConfig`] and owns the background
//! tasks that connect them.
//!
//! ## Wiring
//!
//! ```text
//!   POST /jobs ─▶ JobsService ──┐
//!                               │ commit(state + outbox entry)
//!   JobRunner ──negotiate──▶ marketplace
//!       │                       ▼
//!       └──anchor──▶ AnchorService   OutboxStore ──scan──▶ OutboxPublisher ──▶ InMemoryBus
//!                                                                               │
//!                                          observers ◀── Hub ◀── HubRelay ◀─────┘
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration
//! 2. Load or generate the node key
//! 3. Open the outbox store (memory, or RocksDB under `BEACON_DATA_DIR`)
//! 4. Build envelope, marketplace, anchoring, jobs and runner services
//! 5. `start()`: spawn the hub loop, the outbox publisher and the hub relay

use crate::config::{ConfigError, RuntimeConfig, ServerConfig};
use crate::jobs::JobsService;
use crate::relay::HubRelay;
use crate::runner::JobRunner;
use crate::server::{self, AppState};
use axum::Router;
use pb_01_job_envelope::{EnvelopeService, TrustPolicy};
use pb_02_provider_client::{ClientError, MarketplaceClient, Negotiator, NegotiatorConfig};
use pb_03_outbox::{InMemoryOutboxStore, OutboxPublisher, OutboxStore, StoreError};
#[cfg(feature = "rocksdb")]
use pb_03_outbox::{RocksDbOutboxConfig, RocksDbOutboxStore};
use pb_04_broadcast_hub::{Hub, HubHandle};
use pb_05_anchoring::{build_strategy, AnchorError, AnchorService};
use shared_bus::{InMemoryBus, TopicFilter};
use shared_crypto::{CryptoError, Ed25519KeyPair};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("node key: {0}")]
    Key(#[from] CryptoError),

    #[error("marketplace client: {0}")]
    Marketplace(#[from] ClientError),

    #[error("anchoring: {0}")]
    Anchor(#[from] AnchorError),

    #[error("outbox store: {0}")]
    Store(#[from] StoreError),

    #[error("BEACON_DATA_DIR is set but this build has no durable outbox (enable the rocksdb feature)")]
    DurableStoreUnavailable,
}

/// The running node.
pub struct NodeRuntime {
    config: RuntimeConfig,
    keypair: Arc<Ed25519KeyPair>,
    store: Arc<dyn OutboxStore>,
    bus: Arc<InMemoryBus>,
    hub: HubHandle,
    /// Hub loop, until `start` spawns it.
    hub_loop: Option<Hub>,
    publisher: Arc<OutboxPublisher>,
    jobs: Arc<JobsService>,
    runner: Arc<JobRunner>,
    anchor: Arc<AnchorService>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

fn open_store(server: &ServerConfig) -> Result<Arc<dyn OutboxStore>, RuntimeError> {
    match &server.data_dir {
        None => Ok(Arc::new(InMemoryOutboxStore::new())),
        #[cfg(feature = "rocksdb")]
        Some(dir) => {
            let config = RocksDbOutboxConfig {
                path: dir.join("outbox").to_string_lossy().into_owned(),
                ..RocksDbOutboxConfig::default()
            };
            Ok(Arc::new(RocksDbOutboxStore::open(config)?))
        }
        #[cfg(not(feature = "rocksdb"))]
        Some(_) => Err(RuntimeError::DurableStoreUnavailable),
    }
}

impl NodeRuntime {
    /// Build every subsystem. Nothing runs until [`NodeRuntime::start`].
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;

        let keypair = match &config.server.signing_seed {
            Some(seed) => Ed25519KeyPair::from_seed_hex(seed.trim())?,
            None => {
                warn!("BEACON_SIGNING_SEED not set, using an ephemeral node key");
                Ed25519KeyPair::generate()
            }
        };
        let keypair = Arc::new(keypair);
        info!(public_key = %keypair.public_key().to_base64(), "Node key ready");

        let store = open_store(&config.server)?;
        let bus = Arc::new(InMemoryBus::new());
        let (hub_loop, hub) = Hub::new(config.hub.clone());
        let publisher = Arc::new(OutboxPublisher::new(
            store.clone(),
            bus.clone(),
            config.outbox.clone(),
        ));

        let trust = TrustPolicy::allowlist(config.auth.allowed_submitter_keys.iter().cloned());
        let jobs = Arc::new(JobsService::new(
            Arc::new(EnvelopeService::new(trust)),
            keypair.clone(),
            store.clone(),
        ));

        let marketplace = Arc::new(MarketplaceClient::new(config.marketplace.clone())?);
        let negotiator = Arc::new(Negotiator::new(
            marketplace,
            NegotiatorConfig {
                poll_interval: config.marketplace.poll_interval,
            },
        ));
        let anchor = Arc::new(AnchorService::new(build_strategy(
            &config.anchor,
            keypair.clone(),
        )?));
        let runner = Arc::new(JobRunner::new(negotiator, store.clone(), anchor.clone()));

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            keypair,
            store,
            bus,
            hub,
            hub_loop: Some(hub_loop),
            publisher,
            jobs,
            runner,
            anchor,
            shutdown_tx,
            tasks: Vec::new(),
        })
    }

    /// Spawn the hub loop, the outbox publisher and the hub relay. Calling
    /// it again is a no-op.
    pub fn start(&mut self) {
        let Some(hub_loop) = self.hub_loop.take() else {
            return;
        };
        self.tasks.push(tokio::spawn(hub_loop.run()));
        self.tasks.push(tokio::spawn(
            self.publisher.clone().run(self.shutdown_tx.subscribe()),
        ));

        let relay = HubRelay::new(Arc::new(self.hub.clone()));
        let subscription = self.bus.subscribe(TopicFilter::all());
        self.tasks
            .push(tokio::spawn(relay.run(subscription, self.shutdown_tx.subscribe())));

        info!(
            anchor_network = %self.anchor.strategy().network(),
            send_buffer = self.config.hub.send_buffer,
            "Beacon node started"
        );
    }

    pub fn router(&self) -> Router {
        server::router(AppState {
            jobs: self.jobs.clone(),
            runner: self.runner.clone(),
            hub: self.hub.clone(),
            publisher: self.publisher.clone(),
            auth: self.config.auth.clone(),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn keypair(&self) -> &Arc<Ed25519KeyPair> {
        &self.keypair
    }

    pub fn store(&self) -> &Arc<dyn OutboxStore> {
        &self.store
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    pub fn publisher(&self) -> &Arc<OutboxPublisher> {
        &self.publisher
    }

    pub fn jobs(&self) -> &Arc<JobsService> {
        &self.jobs
    }

    pub fn runner(&self) -> &Arc<JobRunner> {
        &self.runner
    }

    pub fn anchor(&self) -> &Arc<AnchorService> {
        &self.anchor
    }

    /// Stop background tasks. The publisher finishes its current scan and
    /// the hub closes every observer.
    pub async fn shutdown(self) {
        info!("Shutting down Beacon node");
        let _ = self.shutdown_tx.send(true);
        self.hub.shutdown().await;
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        info!("Beacon node stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::topics;
    use pb_04_broadcast_hub::BroadcastMessage;
    use shared_types::{BenchmarkSpec, ContainerSpec, ExecutionConstraints, JobSpec};
    use std::time::Duration;

    fn config() -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.server.signing_seed = Some("11".repeat(32));
        config.outbox.poll_interval = Duration::from_millis(10);
        config
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut bad = config();
        bad.outbox.batch_size = 0;
        assert!(matches!(
            NodeRuntime::new(bad),
            Err(RuntimeError::Config(ConfigError::ZeroBatchSize))
        ));
    }

    #[cfg(not(feature = "rocksdb"))]
    #[test]
    fn test_data_dir_needs_durable_store() {
        let mut durable = config();
        durable.server.data_dir = Some("/tmp/beacon".into());
        assert!(matches!(
            NodeRuntime::new(durable),
            Err(RuntimeError::DurableStoreUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_submitted_job_reaches_observers() {
        let mut runtime = NodeRuntime::new(config()).unwrap();
        runtime.start();
        let mut observer = runtime.hub().register(None).await.unwrap();

        let spec = JobSpec::new(
            "job-7",
            BenchmarkSpec {
                name: "bench".into(),
                container: ContainerSpec {
                    image: "beacon/bench".into(),
                    tag: None,
                },
                resources: Default::default(),
            },
            ExecutionConstraints::for_regions(["US"]),
        );
        runtime.jobs().submit_job(spec, Some("req-7".into())).unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(5), observer.receiver.recv())
            .await
            .unwrap()
            .unwrap();
        let message: BroadcastMessage = serde_json::from_str(&frame).unwrap();
        assert_eq!(message.kind, topics::JOB_CREATED);
        assert_eq!(message.request_id.as_deref(), Some("req-7"));
        assert_eq!(message.data["id"], "job-7");

        runtime.shutdown().await;
    }
}
