//! Coordinator error types.

use thiserror::Error;

use stackscale_core::Component;
use stackscale_cost::CostError;
use stackscale_drain::DrainError;
use stackscale_events::EventError;
use stackscale_predict::PredictError;

/// Errors surfaced by evaluation and execution.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("workload control failed for {component}: {message}")]
    Workload { component: Component, message: String },

    #[error("prediction error: {0}")]
    Predict(#[from] PredictError),

    #[error("cost model error: {0}")]
    Cost(#[from] CostError),

    #[error("drain error: {0}")]
    Drain(#[from] DrainError),

    #[error("event store error: {0}")]
    Events(#[from] EventError),
}

pub type ScaleResult<T> = Result<T, ScaleError>;

impl ScaleError {
    pub(crate) fn workload(component: Component, e: anyhow::Error) -> Self {
        ScaleError::Workload {
            component,
            message: format!("{e:#}"),
        }
    }
}
