use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildtimeError {
    #[error("Failed to read build log: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Failed to serialize job record: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BuildtimeError>;
