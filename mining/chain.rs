//! Interfaces to the node components the miner consumes
//!
//! The miner reads consensus constants from [`ChainParams`], the current tip
//! from a [`ChainState`], and pending transactions from a [`MempoolView`].
//! None of these are owned or mutated by the mining engine.

use crate::block::Transaction;
use crypto_hashes::Hash;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Smallest currency unit per coin
pub const COIN: u64 = 100_000_000;

/// Consensus constants the miner needs
#[derive(Clone, Debug)]
pub struct ChainParams {
    pub name: String,
    /// Loosest allowed target
    pub pow_limit: U256,
    /// Compact encoding of `pow_limit`, used for the first blocks
    pub pow_limit_bits: u32,
    /// Desired time between blocks, informational for estimates
    pub target_spacing_secs: u64,
    /// Subsidy paid at height 0
    pub initial_subsidy: u64,
    /// Blocks between subsidy halvings
    pub halving_interval: u64,
}

impl ChainParams {
    pub fn mainnet() -> Self {
        Self {
            name: "mainnet".to_string(),
            pow_limit: U256::from(0xffffu64) << 208,
            pow_limit_bits: 0x1d00ffff,
            target_spacing_secs: 600,
            initial_subsidy: 50 * COIN,
            halving_interval: 210_000,
        }
    }

    pub fn regtest() -> Self {
        Self {
            name: "regtest".to_string(),
            pow_limit: U256::MAX >> 1,
            pow_limit_bits: 0x207fffff,
            target_spacing_secs: 600,
            initial_subsidy: 50 * COIN,
            halving_interval: 150,
        }
    }

    pub fn for_network(name: &str) -> Option<Self> {
        match name {
            "mainnet" => Some(Self::mainnet()),
            "regtest" => Some(Self::regtest()),
            _ => None,
        }
    }

    /// Block subsidy at `height` under the halving schedule
    pub fn block_subsidy(&self, height: u64) -> u64 {
        let halvings = height / self.halving_interval.max(1);
        if halvings >= 64 {
            0
        } else {
            self.initial_subsidy >> halvings
        }
    }
}

/// The block the next template builds on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTip {
    pub hash: Hash,
    pub height: u64,
    /// Compact target required for the block after the tip
    pub bits: u32,
    /// Median time of the last blocks; a new block must be later
    pub median_time_past: u32,
}

impl ChainTip {
    pub fn next_height(&self) -> u64 {
        self.height + 1
    }
}

/// Read access to the active chain
pub trait ChainState: Send + Sync {
    /// Current tip, or `None` while no valid tip is available (e.g. during startup)
    fn tip(&self) -> Option<ChainTip>;
}

/// A pending transaction with the metadata needed for block assembly
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MempoolEntry {
    pub tx: Transaction,
    pub fee: u64,
    pub weight: u64,
}

impl MempoolEntry {
    pub fn new(tx: Transaction, fee: u64) -> Self {
        let weight = tx.weight();
        Self { tx, fee, weight }
    }

    /// Fee per weight unit
    pub fn fee_rate(&self) -> f64 {
        self.fee as f64 / self.weight.max(1) as f64
    }
}

/// Queryable view of the mempool.
///
/// Ordering (fee rate, ancestors before descendants) is the view's
/// responsibility; the template builder only enforces the caps it passes in.
pub trait MempoolView: Send + Sync {
    fn select(&self, max_weight: u64, min_fee: u64) -> Vec<MempoolEntry>;
}

/// A mempool that never has anything to offer
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyMempool;

impl MempoolView for EmptyMempool {
    fn select(&self, _max_weight: u64, _min_fee: u64) -> Vec<MempoolEntry> {
        Vec::new()
    }
}
