//! stackscale-autoscale — merges scaling signals into decisions and carries
//! them out.
//!
//! # Data flow
//!
//! ```text
//! MetricsSource ──→ PredictiveEngine ─┐
//!               └─→ CostModel ────────┴─→ ScalingCoordinator
//!                                              │ scale-down
//!                                              ▼
//!                                        WorkloadDrainer ──→ WorkloadControl
//!                                              │
//!                                              ▼
//!                                        EventRecorder ──→ ScalingReport
//! ```
//!
//! `evaluate` returns at most one decision per component per cycle.
//! `execute` applies it and always records an event, `reconcile` does both
//! for every component concurrently and `run` repeats that on an interval.

pub mod coordinator;
pub mod error;
pub mod reconcile;

pub use coordinator::{ScalingCoordinator, with_headroom};
pub use error::{ScaleError, ScaleResult};
pub use reconcile::ReconcileSummary;
