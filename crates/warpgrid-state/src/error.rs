//! Error types for the autoscaling state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open state database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("failed to encode record: {0}")]
    Serialize(String),

    #[error("failed to decode record: {0}")]
    Deserialize(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("invalid time range: start {start} is after end {end}")]
    InvalidRange { start: u64, end: u64 },
}
