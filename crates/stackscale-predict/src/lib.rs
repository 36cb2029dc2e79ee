//! stackscale-predict — forecast component load and turn it into replicas.
//!
//! # Models
//!
//! ```text
//! linear       OLS over (seconds since first sample, value), accuracy = R²
//! exponential  smoothed level + per-hour trend, α picked from 0.1..=0.9,
//!              accuracy = 1 − MAPE/100
//! seasonal     24h or 168h period when lag autocorrelation > 0.7,
//!              linear trend × per-position seasonal index; otherwise linear
//! ```
//!
//! Forecasts are emitted lazily at 5-minute steps after the last training
//! sample and never go below zero.

pub mod engine;
pub mod error;
pub mod model;

pub use engine::{CAPACITY_PER_REPLICA, Forecast, MAX_REPLICAS, PredictiveEngine, replicas_for_load};
pub use error::{PredictError, PredictResult};
pub use model::{FORECAST_STEP, MIN_TRAINING_POINTS, ModelFit, PredictiveModel};
