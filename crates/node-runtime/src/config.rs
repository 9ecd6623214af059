//! # Runtime Configuration
//!
//! One typed section per subsystem, each with production defaults. The
//! binary starts from [`RuntimeConfig::default`] and applies environment
//! overrides in [`load_config`].

use pb_02_provider_client::MarketplaceConfig;
use pb_03_outbox::PublisherConfig;
use pb_04_broadcast_hub::HubConfig;
use pb_05_anchoring::{AnchorConfig, StrategyKind};
use shared_crypto::Ed25519KeyPair;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub server: ServerConfig,
    pub marketplace: MarketplaceConfig,
    pub outbox: PublisherConfig,
    pub hub: HubConfig,
    pub anchor: AnchorConfig,
    pub auth: AuthConfig,
}

/// HTTP listener, storage and node identity.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    /// Outbox directory. `None` keeps the outbox in memory.
    pub data_dir: Option<PathBuf>,
    /// Hex Ed25519 seed for the node key. `None` generates a fresh key.
    pub signing_seed: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8090)),
            data_dir: None,
            signing_seed: None,
        }
    }
}

/// Bearer tokens per role, plus the submitter allowlist.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub admin_tokens: Vec<String>,
    pub operator_tokens: Vec<String>,
    /// Base64 Ed25519 keys allowed to submit pre-signed specs. Empty allows any.
    pub allowed_submitter_keys: Vec<String>,
}

impl AuthConfig {
    /// No tokens configured: every caller is let through.
    pub fn is_open(&self) -> bool {
        self.admin_tokens.is_empty() && self.operator_tokens.is_empty()
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: &'static str, message: String },

    #[error("hub {0} must be greater than zero")]
    ZeroHubCapacity(&'static str),

    #[error("hub ping period must be shorter than pong wait")]
    PingNotBeforePong,

    #[error("outbox batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("signing seed must be 32 bytes of hex")]
    BadSigningSeed,

    #[error("anchor strategy {0} needs ANCHOR_LEDGER_FROM")]
    MissingLedgerAccount(StrategyKind),
}

impl RuntimeConfig {
    /// Reject combinations the subsystems cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.send_buffer == 0 {
            return Err(ConfigError::ZeroHubCapacity("send buffer"));
        }
        if self.hub.intake_capacity == 0 {
            return Err(ConfigError::ZeroHubCapacity("intake capacity"));
        }
        if self.hub.ping_period >= self.hub.pong_wait {
            return Err(ConfigError::PingNotBeforePong);
        }
        if self.outbox.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if let Some(seed) = &self.server.signing_seed {
            if Ed25519KeyPair::from_seed_hex(seed).is_err() {
                return Err(ConfigError::BadSigningSeed);
            }
        }
        let needs_ledger = matches!(self.anchor.strategy, StrategyKind::Ledger | StrategyKind::Multi);
        if needs_ledger && self.anchor.ledger.from.trim().is_empty() {
            return Err(ConfigError::MissingLedgerAccount(self.anchor.strategy));
        }
        Ok(())
    }
}

/// Defaults plus environment overrides, validated.
pub fn load_config() -> Result<RuntimeConfig, ConfigError> {
    let config = from_lookup(|key| env::var(key).ok())?;
    config.validate()?;
    info!(
        http_addr = %config.server.http_addr,
        marketplace = %config.marketplace.base_url,
        anchor_strategy = %config.anchor.strategy,
        durable_outbox = config.server.data_dir.is_some(),
        "Configuration loaded"
    );
    Ok(config)
}

fn parse<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var,
        message: e.to_string(),
    })
}

/// Comma-separated list, blanks dropped.
fn csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<RuntimeConfig, ConfigError> {
    let mut config = RuntimeConfig::default();

    // Server
    if let Some(addr) = lookup("BEACON_HTTP_ADDR") {
        config.server.http_addr = parse("BEACON_HTTP_ADDR", &addr)?;
    }
    if let Some(dir) = lookup("BEACON_DATA_DIR").filter(|d| !d.trim().is_empty()) {
        config.server.data_dir = Some(PathBuf::from(dir.trim()));
    }
    if let Some(seed) = lookup("BEACON_SIGNING_SEED").filter(|s| !s.trim().is_empty()) {
        config.server.signing_seed = Some(seed);
    }

    // Marketplace
    if let Some(url) = lookup("MARKETPLACE_BASE_URL") {
        config.marketplace.base_url = url.trim().trim_end_matches('/').to_string();
    }
    if let Some(key) = lookup("MARKETPLACE_APP_KEY").filter(|k| !k.trim().is_empty()) {
        config.marketplace.app_key = Some(key.trim().to_string());
    }
    if let Some(base) = lookup("MARKETPLACE_MARKET_BASE") {
        config.marketplace.market_base = base.trim().to_string();
    }

    // Outbox
    if let Some(size) = lookup("OUTBOX_BATCH_SIZE") {
        config.outbox.batch_size = parse("OUTBOX_BATCH_SIZE", &size)?;
    }
    if let Some(ms) = lookup("OUTBOX_POLL_INTERVAL_MS") {
        config.outbox.poll_interval =
            Duration::from_millis(parse("OUTBOX_POLL_INTERVAL_MS", &ms)?);
    }

    // Hub
    if let Some(size) = lookup("HUB_SEND_BUFFER") {
        config.hub.send_buffer = parse("HUB_SEND_BUFFER", &size)?;
    }
    if let Some(size) = lookup("HUB_INTAKE_CAPACITY") {
        config.hub.intake_capacity = parse("HUB_INTAKE_CAPACITY", &size)?;
    }

    // Anchoring
    if let Some(strategy) = lookup("ANCHOR_STRATEGY") {
        config.anchor.strategy =
            strategy
                .parse()
                .map_err(|e: pb_05_anchoring::AnchorError| ConfigError::InvalidValue {
                    var: "ANCHOR_STRATEGY",
                    message: e.to_string(),
                })?;
    }
    if let Some(url) = lookup("ANCHOR_LEDGER_RPC_URL") {
        config.anchor.ledger.rpc_url = url.trim().to_string();
    }
    if let Some(from) = lookup("ANCHOR_LEDGER_FROM") {
        config.anchor.ledger.from = from.trim().to_string();
    }

    // Auth
    if let Some(tokens) = lookup("ADMIN_TOKENS") {
        config.auth.admin_tokens = csv(&tokens);
    }
    if let Some(tokens) = lookup("OPERATOR_TOKENS") {
        config.auth.operator_tokens = csv(&tokens);
    }
    if let Some(keys) = lookup("ALLOWED_SUBMITTER_KEYS") {
        config.auth.allowed_submitter_keys = csv(&keys);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.hub.send_buffer, 256);
        assert_eq!(config.hub.intake_capacity, 1024);
        assert_eq!(config.outbox.batch_size, 100);
        assert_eq!(config.outbox.poll_interval, Duration::from_millis(500));
        assert_eq!(config.marketplace.market_base, "/market-api/v1");
        assert_eq!(config.anchor.strategy, StrategyKind::Timestamp);
        assert!(config.server.data_dir.is_none());
        assert!(config.auth.is_open());
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let config = from_lookup(lookup(&[
            ("BEACON_HTTP_ADDR", "127.0.0.1:9000"),
            ("MARKETPLACE_APP_KEY", "app-key"),
            ("MARKETPLACE_BASE_URL", "http://market:7465/"),
            ("MARKETPLACE_MARKET_BASE", "/ya-market/v1"),
            ("OUTBOX_BATCH_SIZE", "10"),
            ("OUTBOX_POLL_INTERVAL_MS", "50"),
            ("HUB_SEND_BUFFER", "32"),
            ("ANCHOR_STRATEGY", "multi"),
            ("ANCHOR_LEDGER_FROM", "0xabc"),
            ("ADMIN_TOKENS", "root, ,ops-root"),
            ("OPERATOR_TOKENS", "op"),
        ]))
        .unwrap();

        assert_eq!(config.server.http_addr.port(), 9000);
        assert_eq!(config.marketplace.base_url, "http://market:7465");
        assert_eq!(config.marketplace.app_key.as_deref(), Some("app-key"));
        assert_eq!(config.marketplace.market_base, "/ya-market/v1");
        assert_eq!(config.outbox.batch_size, 10);
        assert_eq!(config.outbox.poll_interval, Duration::from_millis(50));
        assert_eq!(config.hub.send_buffer, 32);
        assert_eq!(config.anchor.strategy, StrategyKind::Multi);
        assert_eq!(config.auth.admin_tokens, vec!["root", "ops-root"]);
        assert!(!config.auth.is_open());
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(matches!(
            from_lookup(lookup(&[("OUTBOX_BATCH_SIZE", "lots")])),
            Err(ConfigError::InvalidValue { var: "OUTBOX_BATCH_SIZE", .. })
        ));
        assert!(matches!(
            from_lookup(lookup(&[("ANCHOR_STRATEGY", "carrier-pigeon")])),
            Err(ConfigError::InvalidValue { var: "ANCHOR_STRATEGY", .. })
        ));
    }

    #[test]
    fn test_validation() {
        let config = from_lookup(lookup(&[("HUB_SEND_BUFFER", "0")])).unwrap();
        assert_eq!(config.validate(), Err(ConfigError::ZeroHubCapacity("send buffer")));

        let config = from_lookup(lookup(&[("BEACON_SIGNING_SEED", "abcd")])).unwrap();
        assert_eq!(config.validate(), Err(ConfigError::BadSigningSeed));

        let not_hex = "zz".repeat(32);
        let config = from_lookup(lookup(&[("BEACON_SIGNING_SEED", not_hex.as_str())])).unwrap();
        assert_eq!(config.validate(), Err(ConfigError::BadSigningSeed));

        let seed = "07".repeat(32);
        let config = from_lookup(lookup(&[("BEACON_SIGNING_SEED", seed.as_str())])).unwrap();
        config.validate().unwrap();

        let config = from_lookup(lookup(&[("ANCHOR_STRATEGY", "ledger")])).unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingLedgerAccount(StrategyKind::Ledger))
        );
    }
}
