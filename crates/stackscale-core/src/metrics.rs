//! Injected metrics sink.
//!
//! Components that want to publish measurements take an
//! `Arc<dyn MetricsSink>` instead of touching a global registry.

/// Label set attached to a sample: `(name, value)` pairs.
pub type Labels<'a> = &'a [(&'a str, &'a str)];

/// Receives counters, gauges and histogram observations.
pub trait MetricsSink: Send + Sync {
    fn incr_counter(&self, name: &str, labels: Labels<'_>, by: f64);
    fn set_gauge(&self, name: &str, labels: Labels<'_>, value: f64);
    fn observe(&self, name: &str, labels: Labels<'_>, value: f64);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn incr_counter(&self, _name: &str, _labels: Labels<'_>, _by: f64) {}
    fn set_gauge(&self, _name: &str, _labels: Labels<'_>, _value: f64) {}
    fn observe(&self, _name: &str, _labels: Labels<'_>, _value: f64) {}
}

/// Series names emitted by the autoscaler.
pub mod names {
    pub const SCALING_EVENTS_TOTAL: &str = "stackscale_scaling_events_total";
    pub const SCALING_DURATION_SECONDS: &str = "stackscale_scaling_duration_seconds";
    pub const CPU_UTILIZATION_PERCENT: &str = "stackscale_component_cpu_utilization_percent";
    pub const MEMORY_UTILIZATION_PERCENT: &str = "stackscale_component_memory_utilization_percent";
    pub const CUSTOM_METRIC_VALUE: &str = "stackscale_component_custom_metric";
    pub const REPLICAS: &str = "stackscale_component_replicas";
    pub const TARGET_REPLICAS: &str = "stackscale_component_target_replicas";
    pub const MONTHLY_COST_USD: &str = "stackscale_component_monthly_cost_usd";
    pub const COST_SAVINGS_USD: &str = "stackscale_cost_savings_monthly_usd";
    pub const PREDICTED_LOAD: &str = "stackscale_predicted_load";
    pub const PREDICTION_ACCURACY_PERCENT: &str = "stackscale_prediction_accuracy_percent";
    pub const DRAINING_PODS: &str = "stackscale_draining_pods";
    pub const DRAIN_DURATION_SECONDS: &str = "stackscale_drain_duration_seconds";
    pub const POLICY_VIOLATIONS_TOTAL: &str = "stackscale_policy_violations_total";
}
