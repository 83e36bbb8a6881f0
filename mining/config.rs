//! Mining session configuration
//!
//! A [`MiningConfig`] can be built in code or loaded from a TOML file. It is
//! validated once by [`crate::MiningController::start`] and then shared
//! read-only with every worker.

use crate::block::{HEADER_SIZE, WITNESS_SCALE_FACTOR};
use crate::errors::{MiningError, MiningResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Weight reserved for the header, the transaction count and a coinbase
pub const COINBASE_WEIGHT_RESERVE: u64 = (HEADER_SIZE as u64 + 9) * WITNESS_SCALE_FACTOR + 1_000;

/// Upper bound for the exponential retry backoff
pub const MAX_RETRY_BACKOFF_MS: u64 = 30_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Number of worker threads
    pub threads: usize,
    /// Script receiving the coinbase reward (hex in config files)
    #[serde(with = "hex")]
    pub payout_script: Vec<u8>,
    /// Maximum block weight including header and coinbase
    pub max_block_weight: u64,
    /// Transactions paying less than this are not included
    pub min_tx_fee: u64,
    /// Hashes between stats flushes and chain-tip checks
    pub batch_size: u64,
    /// Base delay after a failed template build (milliseconds)
    pub retry_backoff_ms: u64,
    /// Extension point, no behaviour attached
    pub adaptive_difficulty: bool,
    /// Extension point, no behaviour attached
    pub smart_fee_selection: bool,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            threads: crate::utils::optimal_thread_count(),
            payout_script: Vec::new(),
            max_block_weight: 4_000_000,
            min_tx_fee: 1_000,
            batch_size: 10_000,
            retry_backoff_ms: 1_000,
            adaptive_difficulty: false,
            smart_fee_selection: false,
        }
    }
}

impl MiningConfig {
    pub fn new(threads: usize, payout_script: Vec<u8>) -> Self {
        Self {
            threads,
            payout_script,
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> MiningResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| MiningError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> MiningResult<Self> {
        toml::from_str(content).map_err(|e| MiningError::Config(format!("failed to parse config: {}", e)))
    }

    pub fn to_toml(&self) -> MiningResult<String> {
        toml::to_string_pretty(self).map_err(|e| MiningError::Config(e.to_string()))
    }

    /// Checks the invariants a mining session relies on
    pub fn validate(&self) -> MiningResult<()> {
        if self.threads == 0 {
            return Err(MiningError::InvalidConfig("thread count must be at least 1".into()));
        }
        if self.payout_script.is_empty() {
            return Err(MiningError::InvalidConfig("payout script must not be empty".into()));
        }
        if self.batch_size == 0 {
            return Err(MiningError::InvalidConfig("batch size must be at least 1".into()));
        }
        if self.retry_backoff_ms == 0 {
            return Err(MiningError::InvalidConfig("retry backoff must be at least 1ms".into()));
        }
        let reserve = COINBASE_WEIGHT_RESERVE + self.payout_script.len() as u64 * WITNESS_SCALE_FACTOR;
        if self.max_block_weight < reserve {
            return Err(MiningError::InvalidConfig(format!(
                "max block weight {} cannot fit a coinbase ({} required)",
                self.max_block_weight, reserve
            )));
        }
        Ok(())
    }
}
