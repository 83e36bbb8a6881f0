//! Hand-off of solved blocks to the validation engine

use crate::block::Block;
use serde::Serialize;
use std::fmt;

/// Why the validation engine refused a block
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    /// The block does not build on the current tip
    StaleTip,
    InvalidTransaction(String),
    /// The header hash does not meet the required target
    InsufficientWork,
    Other(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::StaleTip => write!(f, "stale tip"),
            RejectReason::InvalidTransaction(msg) => write!(f, "invalid transaction: {}", msg),
            RejectReason::InsufficientWork => write!(f, "insufficient work"),
            RejectReason::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Result of a block submission. A rejection is an expected outcome, not an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SubmitOutcome {
    Accepted,
    Rejected(RejectReason),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted)
    }
}

/// Outbound path for solved blocks. Implementations do not retry.
pub trait SubmissionGateway: Send + Sync {
    fn submit(&self, block: &Block) -> SubmitOutcome;
}

/// Accepts every block and logs it; useful when no node is attached
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingGateway;

impl SubmissionGateway for LoggingGateway {
    fn submit(&self, block: &Block) -> SubmitOutcome {
        log::info!(
            "Submitting block {} at height {} with {} transactions",
            block.hash(),
            block.height,
            block.transactions.len()
        );
        SubmitOutcome::Accepted
    }
}
