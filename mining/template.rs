//! Block template assembly
//!
//! Builds a candidate block on top of the current chain tip: a coinbase
//! paying subsidy plus fees to the configured payout script, followed by
//! transactions taken from the mempool within the configured caps.

use crate::block::{BlockTemplate, OutPoint, Transaction, TxIn, TxOut};
use crate::chain::{ChainParams, ChainTip, MempoolView};
use crate::config::MiningConfig;
use crate::errors::{MiningError, MiningResult};
use std::time::{SystemTime, UNIX_EPOCH};

/// Header version used for new templates
pub const BLOCK_VERSION: i32 = 0x2000_0000;

/// Coinbase script_sig length bounds enforced by consensus
pub const MIN_COINBASE_SCRIPT_LEN: usize = 2;
pub const MAX_COINBASE_SCRIPT_LEN: usize = 100;

/// Assembles block templates from chain state and mempool
#[derive(Clone, Debug)]
pub struct BlockTemplateBuilder {
    params: ChainParams,
}

impl BlockTemplateBuilder {
    pub fn new(params: ChainParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Builds a template extending `tip`.
    ///
    /// `extra_nonce` is written into the coinbase so each rebuild yields a
    /// new merkle root, and therefore a fresh nonce space, even when the
    /// timestamp has not moved.
    pub fn build(
        &self,
        tip: Option<&ChainTip>,
        config: &MiningConfig,
        mempool: &dyn MempoolView,
        extra_nonce: u64,
    ) -> MiningResult<BlockTemplate> {
        let tip = tip.ok_or(MiningError::EmptyChainState)?;
        let height = tip.next_height();
        let subsidy = self.params.block_subsidy(height);

        let coinbase = coinbase_transaction(height, extra_nonce, subsidy, &config.payout_script)?;
        let timestamp = current_time().max(tip.median_time_past.saturating_add(1));
        let mut template = BlockTemplate::new(BLOCK_VERSION, tip.hash, timestamp, tip.bits, height, coinbase);

        let budget = config.max_block_weight.saturating_sub(template.weight());
        let mut used = 0u64;
        for entry in mempool.select(budget, config.min_tx_fee) {
            // Stop at the first entry breaking a cap; a prefix keeps the
            // mempool's ancestor ordering intact.
            if entry.fee < config.min_tx_fee {
                break;
            }
            let next = match used.checked_add(entry.weight) {
                Some(next) if next <= budget => next,
                _ => break,
            };
            if template.total_fees().checked_add(entry.fee).is_none() {
                break;
            }
            used = next;
            template.push_transaction(entry.tx, entry.fee);
        }

        if template.total_fees() > 0 {
            let coinbase = coinbase_transaction(
                height,
                extra_nonce,
                subsidy.saturating_add(template.total_fees()),
                &config.payout_script,
            )?;
            template.set_coinbase(coinbase);
        }

        log::debug!(
            "Built template at height {} with {} transactions, weight {}, fees {}",
            height,
            template.transactions().len(),
            template.weight(),
            template.total_fees()
        );

        Ok(template)
    }
}

/// Creates the reward-granting first transaction of a block
pub fn coinbase_transaction(
    height: u64,
    extra_nonce: u64,
    value: u64,
    payout_script: &[u8],
) -> MiningResult<Transaction> {
    let mut script_sig = Vec::with_capacity(24);
    push_script_number(&mut script_sig, height);
    push_script_number(&mut script_sig, extra_nonce);

    if !(MIN_COINBASE_SCRIPT_LEN..=MAX_COINBASE_SCRIPT_LEN).contains(&script_sig.len()) {
        return Err(MiningError::InvalidTemplate(format!(
            "coinbase script length {} out of range",
            script_sig.len()
        )));
    }

    Ok(Transaction {
        version: 1,
        inputs: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig,
            sequence: u32::MAX,
        }],
        outputs: vec![TxOut {
            value,
            script_pubkey: payout_script.to_vec(),
        }],
        lock_time: 0,
    })
}

/// Pushes `n` as a minimally encoded script number
fn push_script_number(script: &mut Vec<u8>, n: u64) {
    if n == 0 {
        // OP_0
        script.push(0x00);
        return;
    }
    if n <= 16 {
        // OP_1..OP_16
        script.push(0x50 + n as u8);
        return;
    }
    let mut bytes = n.to_le_bytes().to_vec();
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    // Keep the number positive when the top bit is set.
    if bytes.last().is_some_and(|b| b & 0x80 != 0) {
        bytes.push(0);
    }
    script.push(bytes.len() as u8);
    script.extend_from_slice(&bytes);
}

fn current_time() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .min(u32::MAX as u64) as u32
}
