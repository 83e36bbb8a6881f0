//! Proof-of-work mining engine
//!
//! This crate builds candidate blocks on top of the current chain tip, searches
//! the 32-bit nonce space across a pool of worker threads, and hands solved
//! blocks to a submission gateway. The chain, mempool and submission path are
//! consumed through traits, so the engine runs against a full node or against
//! the in-memory [`devnet`].
//!
//! ## Module Organization
//!
//! - [`pow`]: Compact difficulty decoding, target comparison and the `PowHasher` seam
//! - [`block`]: Header, transaction and block template types with canonical serialization
//! - [`chain`]: Chain parameters and the chain-state / mempool interfaces
//! - [`template`]: Block template assembly from chain tip and mempool
//! - [`worker`]: Per-thread nonce search state machine
//! - [`manager`]: Session lifecycle and worker pool
//! - [`stats`]: Session-wide counters and snapshots
//! - [`submission`]: Outbound path for solved blocks
//! - [`config`]: Session configuration (TOML)
//! - [`utils`]: Time-to-block, reward and profitability estimates
//! - [`devnet`]: In-memory chain and mempool

pub mod block;
pub mod chain;
pub mod config;
pub mod devnet;
pub mod errors;
pub mod manager;
pub mod pow;
pub mod stats;
pub mod submission;
pub mod template;
pub mod utils;
pub mod worker;


// Re-export main types for easier access
pub use block::{Block, BlockHeader, BlockTemplate, Transaction, TxIn, TxOut, OutPoint};
pub use chain::{ChainParams, ChainState, ChainTip, MempoolEntry, MempoolView};
pub use config::MiningConfig;
pub use devnet::{DevnetChain, InMemoryMempool};
pub use errors::{MiningError, MiningResult};
pub use manager::MiningController;
pub use pow::{DoubleSha256, PowHasher, ProofOfWork, Target};
pub use stats::{MiningStatsRegistry, MiningStatsSnapshot};
pub use submission::{LoggingGateway, RejectReason, SubmissionGateway, SubmitOutcome};
pub use template::BlockTemplateBuilder;
pub use worker::{MiningEvent, NonceRange, NonceSearchWorker, WorkerState};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::chain::{ChainParams, ChainState, ChainTip, MempoolView};
    pub use crate::config::MiningConfig;
    pub use crate::devnet::{DevnetChain, InMemoryMempool};
    pub use crate::errors::{MiningError, MiningResult};
    pub use crate::manager::MiningController;
    pub use crate::pow::{DoubleSha256, PowHasher, Target};
    pub use crate::stats::MiningStatsSnapshot;
    pub use crate::submission::{SubmissionGateway, SubmitOutcome};
    pub use crate::worker::MiningEvent;
}
