//! Autoscaler error types.

use thiserror::Error;

use warpgrid_forecast::ForecastError;
use warpgrid_state::StateError;

use crate::decision::DecisionError;

#[derive(Debug, Error)]
pub enum AutoscaleError {
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("scaling of {0} cancelled before the actuator was called")]
    Cancelled(String),

    #[error("scaling outcome unknown for {0}: cancelled after the actuator call was issued")]
    OutcomeUnknown(String),

    #[error("collaborator failed: {0}")]
    Collaborator(#[from] anyhow::Error),
}

pub type AutoscaleResult<T> = Result<T, AutoscaleError>;
