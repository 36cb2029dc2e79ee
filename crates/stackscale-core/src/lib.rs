//! stackscale-core — shared vocabulary for the StackScale autoscaler.
//!
//! Every other crate in the workspace speaks in these types: the managed
//! [`Component`]s of the observability stack, the [`ScalingDecision`]s the
//! coordinator produces, the [`ScalingEvent`]s the event store keeps, and the
//! narrow capability traits through which the core talks to the outside
//! world (metrics source, workload control, metrics sink).

pub mod capability;
pub mod config;
pub mod duration;
pub mod metrics;
pub mod types;

pub use capability::{BoxFuture, MetricsSource, ResourceKind, WorkloadControl};
pub use config::{AutoscalingConfig, EventStoreConfig};
pub use duration::{format_duration, parse_duration};
pub use metrics::{MetricsSink, NoopMetrics};
pub use types::*;
