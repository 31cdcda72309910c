//! Forecaster error types.

use thiserror::Error;

/// Errors that abort a whole forecast batch.
///
/// Per-metric problems (no data, fetch failures, timeouts) never surface
/// here; those metrics are skipped.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("invalid forecast request: {0}")]
    InvalidRequest(String),

    #[error("forecast cancelled")]
    Cancelled,
}

pub type ForecastResult<T> = Result<T, ForecastError>;
