//! Error types for the predictive engine.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for predictive engine operations.
pub type PredictResult<T> = Result<T, PredictError>;

#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    #[error("insufficient data points for training: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("model not trained")]
    NotTrained,

    #[error("no forecast points within a horizon of {horizon:?}")]
    EmptyForecast { horizon: Duration },
}
