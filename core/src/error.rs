use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run exceeded wall-clock budget: {elapsed_secs}s elapsed, budget {budget_secs}s")]
    Timeout { elapsed_secs: u64, budget_secs: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ReconResult<T> = Result<T, ReconError>;
