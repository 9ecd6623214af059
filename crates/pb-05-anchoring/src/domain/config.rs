//! # Anchoring Configuration

use super::errors::AnchorError;
use crate::adapters::ledger::LedgerConfig;
use std::fmt;
use std::str::FromStr;

/// Which backends to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StrategyKind {
    #[default]
    Timestamp,
    Ledger,
    /// Timestamp first, ledger as fallback.
    Multi,
}

impl FromStr for StrategyKind {
    type Err = AnchorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "timestamp" => Ok(StrategyKind::Timestamp),
            "ledger" | "ethereum" => Ok(StrategyKind::Ledger),
            "multi" => Ok(StrategyKind::Multi),
            other => Err(AnchorError::Config(format!("unknown anchor strategy {other:?}"))),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::Timestamp => "timestamp",
            StrategyKind::Ledger => "ledger",
            StrategyKind::Multi => "multi",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnchorConfig {
    pub strategy: StrategyKind,
    pub ledger: LedgerConfig,
}
