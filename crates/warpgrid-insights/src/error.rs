//! Insights error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InsightsError {
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("collaborator failed: {0}")]
    Collaborator(#[from] anyhow::Error),
}

pub type InsightsResult<T> = Result<T, InsightsError>;
