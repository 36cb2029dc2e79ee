//! Error types for the workload drainer.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for drain operations.
pub type DrainResult<T> = Result<T, DrainError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DrainError {
    #[error("pod {pod} still present after {waited:?}")]
    Timeout { pod: String, waited: Duration },

    #[error("drain disallowed: {reason}")]
    Disallowed { reason: String },

    #[error("cluster operation failed: {0}")]
    Cluster(String),

    #[error("drain cancelled: deadline reached")]
    Cancelled,
}

impl From<anyhow::Error> for DrainError {
    fn from(e: anyhow::Error) -> Self {
        DrainError::Cluster(format!("{e:#}"))
    }
}
