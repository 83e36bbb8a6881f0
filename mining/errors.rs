use thiserror::Error;

/// Errors produced by the mining engine.
///
/// Only configuration-time errors (`InvalidConfig`, `AlreadyMining`, `Spawn`)
/// are returned from [`crate::MiningController::start`]. Everything else is
/// absorbed by the worker loop and retried.
#[derive(Error, Debug)]
pub enum MiningError {
    #[error("Invalid mining config: {0}")]
    InvalidConfig(String),

    #[error("Mining session already active")]
    AlreadyMining,

    #[error("Malformed difficulty bits {bits:#010x}")]
    MalformedDifficulty { bits: u32 },

    #[error("No chain tip available")]
    EmptyChainState,

    #[error("Invalid block template: {0}")]
    InvalidTemplate(String),

    #[error("Failed to spawn mining thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Config file error: {0}")]
    Config(String),
}

pub type MiningResult<T> = Result<T, MiningError>;

impl MiningError {
    /// Per-attempt errors that a worker retries after backing off.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MiningError::MalformedDifficulty { .. }
                | MiningError::EmptyChainState
                | MiningError::InvalidTemplate(_)
        )
    }
}
