//! Error types for the cost model.

use thiserror::Error;

use stackscale_core::Component;

/// Result type alias for cost model operations.
pub type CostResult<T> = Result<T, CostError>;

#[derive(Debug, Error, PartialEq)]
pub enum CostError {
    #[error("no configuration for {component} fits within budget ${budget:.2}")]
    NoFeasibleConfiguration { component: Component, budget: f64 },

    #[error("no cost history available for {component}")]
    EmptyHistory { component: Component },
}
