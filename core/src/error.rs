use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Missing key '{field}' in {table} row {row}")]
    MissingKey {
        table: &'static str,
        row:   usize,
        field: &'static str,
    },

    #[error("No rows matched: {context}")]
    EmptyJoinResult { context: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RiskResult<T> = Result<T, RiskError>;
