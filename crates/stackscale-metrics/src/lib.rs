//! stackscale-metrics — in-process metrics for the autoscaler.
//!
//! The coordinator, drainer and event recorder publish through the
//! `MetricsSink` capability from `stackscale-core`. `MetricsRegistry` is the
//! implementation the host injects when it wants to read the values back
//! (for its own exposition endpoint, or in tests).
//!
//! # Architecture
//!
//! ```text
//! MetricsRegistry
//!   ├── incr_counter() ← monotonic totals (events, violations)
//!   ├── set_gauge()    ← last value wins (replicas, cost, accuracy)
//!   ├── observe()      ← bounded sample window per series (durations)
//!   └── snapshot()     → counters, gauges, histogram summaries
//! ```

pub mod registry;

pub use registry::{HistogramSummary, MetricsRegistry, MetricsSnapshot, SeriesKey};
