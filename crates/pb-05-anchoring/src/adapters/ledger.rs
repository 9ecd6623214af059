//! # Ledger Anchoring (Ethereum JSON-RPC)
//!
//! Anchors a hash by sending a transaction whose calldata is the hash. The
//! node at `rpc_url` signs with the unlocked `from` account.
//!
//! | Operation  | RPC calls |
//! |------------|-----------|
//! | anchor     | `eth_sendTransaction`, `eth_blockNumber` |
//! | verify     | `eth_getTransactionByHash`, `eth_getTransactionReceipt` |
//! | get_status | `eth_getTransactionReceipt`, `eth_blockNumber` (or `eth_getTransactionByHash` while unmined) |

use crate::domain::anchor::{normalize_hash, AnchorResult, AnchorState, AnchorStatus};
use crate::domain::errors::AnchorError;
use crate::ports::outbound::AnchorStrategy;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use shared_types::CallContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

pub const LEDGER_NETWORK: &str = "ethereum";

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub rpc_url: String,
    /// Unlocked sending account.
    pub from: String,
    /// Recipient; the sender itself when unset.
    pub to: Option<String>,
    pub gas_limit: u64,
    /// Confirmations before an anchor counts as confirmed.
    pub required_confirmations: u64,
    pub request_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            from: String::new(),
            to: None,
            gas_limit: 30_000,
            required_confirmations: 12,
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct LedgerStrategy {
    http: reqwest::Client,
    config: LedgerConfig,
    next_id: AtomicU64,
}

fn unavailable(message: impl ToString) -> AnchorError {
    AnchorError::Unavailable {
        network: LEDGER_NETWORK.to_string(),
        message: message.to_string(),
    }
}

fn invalid(message: impl ToString) -> AnchorError {
    AnchorError::InvalidResponse {
        network: LEDGER_NETWORK.to_string(),
        message: message.to_string(),
    }
}

/// Parse a JSON-RPC hex quantity such as `"0x1b4"`.
fn quantity(value: &Value) -> Result<u64, AnchorError> {
    let text = value
        .as_str()
        .ok_or_else(|| invalid(format!("expected hex quantity, got {value}")))?;
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| invalid(format!("quantity without 0x prefix: {text}")))?;
    u64::from_str_radix(digits, 16).map_err(|e| invalid(format!("bad quantity {text}: {e}")))
}

impl LedgerStrategy {
    pub fn new(config: LedgerConfig) -> Result<Self, AnchorError> {
        if config.from.is_empty() {
            return Err(AnchorError::Config("ledger sender account is not set".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AnchorError::Config(e.to_string()))?;
        Ok(Self {
            http,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    async fn rpc(&self, ctx: &CallContext, method: &str, params: Value) -> Result<Value, AnchorError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let call = async {
            let response = self
                .http
                .post(&self.config.rpc_url)
                .json(&body)
                .send()
                .await
                .map_err(unavailable)?;
            let status = response.status();
            if !status.is_success() {
                return Err(unavailable(format!("{method}: HTTP {status}")));
            }
            response.json::<Value>().await.map_err(invalid)
        };
        let mut reply = ctx.run(call).await??;

        if let Some(error) = reply.get("error").filter(|e| !e.is_null()) {
            return Err(AnchorError::Rejected {
                network: LEDGER_NETWORK.to_string(),
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
        debug!(method, "Ledger RPC call");
        Ok(reply.get_mut("result").map(Value::take).unwrap_or(Value::Null))
    }

    async fn block_number(&self, ctx: &CallContext) -> Result<u64, AnchorError> {
        quantity(&self.rpc(ctx, "eth_blockNumber", json!([])).await?)
    }
}

#[async_trait]
impl AnchorStrategy for LedgerStrategy {
    fn network(&self) -> &str {
        LEDGER_NETWORK
    }

    fn recognizes(&self, tx_handle: &str) -> bool {
        tx_handle.len() == 66
            && tx_handle.starts_with("0x")
            && tx_handle[2..].bytes().all(|b| b.is_ascii_hexdigit())
    }

    async fn anchor(&self, ctx: &CallContext, hash: &str) -> Result<AnchorResult, AnchorError> {
        let digits = normalize_hash(hash)?;
        let to = self.config.to.as_deref().unwrap_or(&self.config.from);
        let tx = json!({
            "from": self.config.from,
            "to": to,
            "gas": format!("0x{:x}", self.config.gas_limit),
            "value": "0x0",
            "data": format!("0x{digits}"),
        });

        let tx_hash = self.rpc(ctx, "eth_sendTransaction", json!([tx])).await?;
        let tx_handle = tx_hash
            .as_str()
            .filter(|h| self.recognizes(h))
            .ok_or_else(|| invalid(format!("unexpected transaction hash {tx_hash}")))?
            .to_string();
        let block_number = self.block_number(ctx).await?;

        Ok(AnchorResult {
            tx_handle,
            anchored_hash: hash.to_string(),
            network: LEDGER_NETWORK.to_string(),
            cost: format!("{} gas", self.config.gas_limit),
            block_number,
            timestamp: Utc::now(),
        })
    }

    async fn verify_anchor(
        &self,
        ctx: &CallContext,
        result: &AnchorResult,
    ) -> Result<bool, AnchorError> {
        if result.network != LEDGER_NETWORK || !self.recognizes(&result.tx_handle) {
            return Ok(false);
        }
        let Ok(digits) = normalize_hash(&result.anchored_hash) else {
            return Ok(false);
        };

        let tx = self
            .rpc(ctx, "eth_getTransactionByHash", json!([result.tx_handle]))
            .await?;
        if tx.is_null() {
            return Ok(false);
        }
        let input = tx.get("input").and_then(Value::as_str).unwrap_or_default();
        if !input.eq_ignore_ascii_case(&format!("0x{digits}")) {
            return Ok(false);
        }

        let receipt = self
            .rpc(ctx, "eth_getTransactionReceipt", json!([result.tx_handle]))
            .await?;
        let reverted = receipt.get("status").and_then(Value::as_str) == Some("0x0");
        Ok(!reverted)
    }

    async fn get_status(
        &self,
        ctx: &CallContext,
        tx_handle: &str,
    ) -> Result<AnchorStatus, AnchorError> {
        if !self.recognizes(tx_handle) {
            return Err(AnchorError::NotFound(tx_handle.to_string()));
        }

        let receipt = self
            .rpc(ctx, "eth_getTransactionReceipt", json!([tx_handle]))
            .await?;
        if receipt.is_null() {
            let tx = self
                .rpc(ctx, "eth_getTransactionByHash", json!([tx_handle]))
                .await?;
            if tx.is_null() {
                return Err(AnchorError::NotFound(tx_handle.to_string()));
            }
            return Ok(AnchorStatus {
                tx_handle: tx_handle.to_string(),
                status: AnchorState::Pending,
                confirmations: 0,
                block_number: None,
                timestamp: Utc::now(),
            });
        }

        let mined_in = quantity(receipt.get("blockNumber").unwrap_or(&Value::Null))?;
        let head = self.block_number(ctx).await?;
        let confirmations = head.saturating_sub(mined_in) + 1;
        let status = if receipt.get("status").and_then(Value::as_str) == Some("0x0") {
            AnchorState::Failed
        } else if confirmations >= self.config.required_confirmations {
            AnchorState::Confirmed
        } else {
            AnchorState::Pending
        };

        Ok(AnchorStatus {
            tx_handle: tx_handle.to_string(),
            status,
            confirmations,
            block_number: Some(mined_in),
            timestamp: Utc::now(),
        })
    }
}
