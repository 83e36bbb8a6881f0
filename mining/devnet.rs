//! In-memory chain and mempool for local mining
//!
//! [`DevnetChain`] plays both node roles the miner talks to: it serves the
//! chain tip and validates submitted blocks, advancing the tip when one is
//! accepted. Difficulty stays fixed at the bits the chain was created with.
//! [`InMemoryMempool`] hands out transactions ordered by fee rate.

use crate::block::{Block, Transaction};
use crate::chain::{ChainParams, ChainState, ChainTip, MempoolEntry, MempoolView};
use crate::pow::{DoubleSha256, PowHasher, ProofOfWork, Target};
use crate::submission::{RejectReason, SubmissionGateway, SubmitOutcome};
use crypto_hashes::{double_sha256, merkle_root, Hash};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct DevnetState {
    tip: ChainTip,
    blocks: Vec<Block>,
}

/// A single-node chain that accepts valid blocks on its tip
pub struct DevnetChain {
    params: ChainParams,
    hasher: Arc<dyn PowHasher>,
    mempool: Option<Arc<InMemoryMempool>>,
    state: Mutex<DevnetState>,
}

impl DevnetChain {
    /// Creates a chain at a synthetic genesis mined at the pow limit
    pub fn new(params: ChainParams) -> Self {
        let bits = params.pow_limit_bits;
        Self::with_bits(params, bits)
    }

    /// Creates a chain whose blocks must meet `bits`
    pub fn with_bits(params: ChainParams, bits: u32) -> Self {
        let genesis = ChainTip {
            hash: Hash::from(double_sha256(params.name.as_bytes())),
            height: 0,
            bits,
            median_time_past: 0,
        };
        Self {
            params,
            hasher: Arc::new(DoubleSha256),
            mempool: None,
            state: Mutex::new(DevnetState {
                tip: genesis,
                blocks: Vec::new(),
            }),
        }
    }

    /// Validates proof of work with `hasher` instead of double-SHA256
    pub fn with_hasher(mut self, hasher: Arc<dyn PowHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Removes transactions from `mempool` once they are mined
    pub fn with_mempool(mut self, mempool: Arc<InMemoryMempool>) -> Self {
        self.mempool = Some(mempool);
        self
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn height(&self) -> u64 {
        self.lock().tip.height
    }

    /// Blocks accepted so far, oldest first
    pub fn blocks(&self) -> Vec<Block> {
        self.lock().blocks.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DevnetState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn validate(&self, tip: &ChainTip, block: &Block) -> Result<(), RejectReason> {
        let header = &block.header;
        if header.prev_block_hash != tip.hash || block.height != tip.next_height() {
            return Err(RejectReason::StaleTip);
        }
        if block.coinbase().is_none() {
            return Err(RejectReason::InvalidTransaction("missing coinbase".into()));
        }
        if block.transactions.iter().skip(1).any(Transaction::is_coinbase) {
            return Err(RejectReason::InvalidTransaction("extra coinbase".into()));
        }
        let txids: Vec<Hash> = block.transactions.iter().map(Transaction::txid).collect();
        if merkle_root(&txids) != header.merkle_root {
            return Err(RejectReason::InvalidTransaction("merkle root mismatch".into()));
        }
        if header.timestamp <= tip.median_time_past {
            return Err(RejectReason::Other("timestamp too early".into()));
        }
        if header.bits != tip.bits {
            return Err(RejectReason::Other(format!("unexpected bits {:#010x}", header.bits)));
        }
        let target = Target::derive(header.bits, self.params.pow_limit)
            .map_err(|e| RejectReason::Other(e.to_string()))?;
        if !ProofOfWork::check(self.hasher.as_ref(), &header.serialize(), &target) {
            return Err(RejectReason::InsufficientWork);
        }
        Ok(())
    }
}

impl ChainState for DevnetChain {
    fn tip(&self) -> Option<ChainTip> {
        Some(self.lock().tip)
    }
}

impl SubmissionGateway for DevnetChain {
    fn submit(&self, block: &Block) -> SubmitOutcome {
        let mut state = self.lock();
        if let Err(reason) = self.validate(&state.tip, block) {
            log::debug!("Devnet rejected block {}: {}", block.hash(), reason);
            return SubmitOutcome::Rejected(reason);
        }

        state.tip = ChainTip {
            hash: block.hash(),
            height: block.height,
            bits: state.tip.bits,
            median_time_past: block.header.timestamp,
        };
        state.blocks.push(block.clone());
        drop(state);

        if let Some(mempool) = &self.mempool {
            mempool.remove_confirmed(&block.transactions);
        }
        log::info!("Devnet accepted block {} at height {}", block.hash(), block.height);
        SubmitOutcome::Accepted
    }
}

/// Mempool held in memory, served highest fee rate first
#[derive(Debug, Default)]
pub struct InMemoryMempool {
    entries: Mutex<Vec<MempoolEntry>>,
}

impl InMemoryMempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, tx: Transaction, fee: u64) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MempoolEntry::new(tx, fee));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry whose txid appears in `transactions`
    pub fn remove_confirmed(&self, transactions: &[Transaction]) {
        let mined: HashSet<Hash> = transactions.iter().map(Transaction::txid).collect();
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|entry| !mined.contains(&entry.tx.txid()));
    }
}

impl MempoolView for InMemoryMempool {
    fn select(&self, max_weight: u64, min_fee: u64) -> Vec<MempoolEntry> {
        let mut candidates: Vec<MempoolEntry> = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|entry| entry.fee >= min_fee)
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.fee_rate().total_cmp(&a.fee_rate()));

        let mut used = 0u64;
        candidates
            .into_iter()
            .take_while(|entry| {
                used += entry.weight;
                used <= max_weight
            })
            .collect()
    }
}
