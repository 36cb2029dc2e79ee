//! Domain types shared across StackScale crates.
//!
//! These types describe the managed components, the scaling policies that
//! govern them, the decisions the coordinator makes and the events that
//! record what actually happened. All types serialize to JSON so the event
//! store can keep them as key → JSON blobs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

// ── Components ─────────────────────────────────────────────────────

/// One managed element of the observability stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Component {
    MetricsCollector,
    DashboardService,
    LogStore,
    TraceStore,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::MetricsCollector,
        Component::DashboardService,
        Component::LogStore,
        Component::TraceStore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::MetricsCollector => "metrics-collector",
            Component::DashboardService => "dashboard-service",
            Component::LogStore => "log-store",
            Component::TraceStore => "trace-store",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Strategies and models ──────────────────────────────────────────

/// The scaling approach that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Horizontal,
    Vertical,
    Predictive,
    CostAware,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Horizontal => "horizontal",
            StrategyKind::Vertical => "vertical",
            StrategyKind::Predictive => "predictive",
            StrategyKind::CostAware => "cost-aware",
        }
    }

    /// Reactive strategies are materialized as native autoscaler objects
    /// outside the core and never produce a coordinator decision.
    pub fn is_reactive(&self) -> bool {
        matches!(self, StrategyKind::Horizontal | StrategyKind::Vertical)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forecasting model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    Linear,
    Exponential,
    Seasonal,
}

impl ModelKind {
    /// Resolve a model name; anything unrecognized is linear.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "exponential" | "exponential_smoothing" | "exponential-smoothing" => {
                ModelKind::Exponential
            }
            "seasonal" => ModelKind::Seasonal,
            _ => ModelKind::Linear,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::Exponential => "exponential",
            ModelKind::Seasonal => "seasonal",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cloud pricing profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    #[default]
    Aws,
    Gcp,
    Azure,
    OnPrem,
}

impl CloudProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Gcp => "gcp",
            CloudProvider::Azure => "azure",
            CloudProvider::OnPrem => "onprem",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Resources ──────────────────────────────────────────────────────

/// A named (CPU, memory) request/limit pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceShape {
    pub name: String,
    pub cpu_request_millis: u64,
    pub memory_request_bytes: u64,
    pub cpu_limit_millis: u64,
    pub memory_limit_bytes: u64,
}

impl ResourceShape {
    pub fn new(
        name: &str,
        cpu_request_millis: u64,
        memory_request_bytes: u64,
        cpu_limit_millis: u64,
        memory_limit_bytes: u64,
    ) -> Self {
        Self {
            name: name.to_string(),
            cpu_request_millis,
            memory_request_bytes,
            cpu_limit_millis,
            memory_limit_bytes,
        }
    }

    /// A shape whose limits equal its requests.
    pub fn requests(name: &str, cpu_millis: u64, memory_bytes: u64) -> Self {
        Self::new(name, cpu_millis, memory_bytes, cpu_millis, memory_bytes)
    }

    pub fn cpu_cores(&self) -> f64 {
        self.cpu_request_millis as f64 / 1000.0
    }

    pub fn memory_gib(&self) -> f64 {
        self.memory_request_bytes as f64 / GIB as f64
    }

    /// Same requests and limits, regardless of name.
    pub fn same_resources(&self, other: &ResourceShape) -> bool {
        self.cpu_request_millis == other.cpu_request_millis
            && self.memory_request_bytes == other.memory_request_bytes
            && self.cpu_limit_millis == other.cpu_limit_millis
            && self.memory_limit_bytes == other.memory_limit_bytes
    }
}

// ── Metrics ────────────────────────────────────────────────────────

/// An immutable utilization sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl MetricDataPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }
}

/// A custom metric the reactive autoscaler should also track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMetricSpec {
    pub name: String,
    /// Where the metric comes from: "prometheus" or "external".
    pub source: String,
    pub query: String,
    pub target_value: f64,
}

// ── Policies and decisions ─────────────────────────────────────────

/// Scaling behavior for one component. Immutable per evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub name: String,
    pub strategy: StrategyKind,
    pub min_replicas: u32,
    pub max_replicas: u32,
    #[serde(default)]
    pub target_cpu_percent: Option<u32>,
    #[serde(default)]
    pub target_memory_percent: Option<u32>,
    #[serde(default)]
    pub custom_metrics: Vec<CustomMetricSpec>,
    /// Monthly budget in USD for cost-aware scaling.
    #[serde(default)]
    pub cost_threshold: Option<f64>,
    /// Headroom added on top of forecast load, in percent.
    #[serde(default)]
    pub resource_buffer_percent: u32,
}

impl ScalingPolicy {
    pub fn new(name: &str, strategy: StrategyKind, min_replicas: u32, max_replicas: u32) -> Self {
        Self {
            name: name.to_string(),
            strategy,
            min_replicas,
            max_replicas,
            target_cpu_percent: None,
            target_memory_percent: None,
            custom_metrics: Vec::new(),
            cost_threshold: None,
            resource_buffer_percent: 0,
        }
    }

    /// Upper bound, never below the lower bound.
    pub fn effective_max(&self) -> u32 {
        self.max_replicas.max(self.min_replicas)
    }

    /// Clamp a replica count into `[min_replicas, max_replicas]`.
    pub fn clamp(&self, replicas: u32) -> u32 {
        replicas.clamp(self.min_replicas, self.effective_max())
    }

    pub fn contains(&self, replicas: u32) -> bool {
        (self.min_replicas..=self.effective_max()).contains(&replicas)
    }
}

/// Cost consequences of a decision, in currency units per month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostImpact {
    pub current_cost: f64,
    pub projected_cost: f64,
    /// `current_cost - projected_cost`; negative when the change costs more.
    pub monthly_savings: f64,
    pub currency: String,
}

impl CostImpact {
    pub fn new(current_cost: f64, projected_cost: f64) -> Self {
        Self {
            current_cost,
            projected_cost,
            monthly_savings: current_cost - projected_cost,
            currency: "USD".to_string(),
        }
    }
}

/// One coordinator verdict for a component. Superseded, never retracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingDecision {
    pub strategy: StrategyKind,
    pub component: Component,
    pub current_replicas: u32,
    pub target_replicas: u32,
    #[serde(default)]
    pub current_shape: Option<ResourceShape>,
    #[serde(default)]
    pub target_shape: Option<ResourceShape>,
    pub reason: String,
    #[serde(default)]
    pub cost_impact: Option<CostImpact>,
    pub timestamp: DateTime<Utc>,
}

impl ScalingDecision {
    pub fn is_scale_down(&self) -> bool {
        self.target_replicas < self.current_replicas
    }

    /// Whether applying the decision changes replicas or resources.
    pub fn changes_anything(&self) -> bool {
        if self.target_replicas != self.current_replicas {
            return true;
        }
        match (&self.current_shape, &self.target_shape) {
            (Some(current), Some(target)) => !current.same_resources(target),
            (None, Some(_)) => true,
            _ => false,
        }
    }
}

// ── Events ─────────────────────────────────────────────────────────

/// Observed outcome of applying a decision. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingEvent {
    /// Empty until assigned by the recorder.
    #[serde(default)]
    pub id: String,
    pub strategy: StrategyKind,
    pub component: Component,
    pub from_replicas: u32,
    pub to_replicas: u32,
    #[serde(default)]
    pub from_shape: Option<ResourceShape>,
    #[serde(default)]
    pub to_shape: Option<ResourceShape>,
    pub reason: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(with = "crate::duration::serde_str")]
    pub duration: Duration,
    #[serde(default)]
    pub cost_impact: Option<CostImpact>,
    pub timestamp: DateTime<Utc>,
}

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

impl ScalingEvent {
    /// A successful event whose `to` state is exactly the decision's target.
    pub fn succeeded(decision: &ScalingDecision, duration: Duration, at: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            strategy: decision.strategy,
            component: decision.component,
            from_replicas: decision.current_replicas,
            to_replicas: decision.target_replicas,
            from_shape: decision.current_shape.clone(),
            to_shape: decision
                .target_shape
                .clone()
                .or_else(|| decision.current_shape.clone()),
            reason: decision.reason.clone(),
            success: true,
            error: None,
            duration,
            cost_impact: decision.cost_impact.clone(),
            timestamp: at,
        }
    }

    /// A failed event; `to_replicas` is what the component actually ended at.
    pub fn failed(
        decision: &ScalingDecision,
        reached_replicas: u32,
        error: String,
        duration: Duration,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            strategy: decision.strategy,
            component: decision.component,
            from_replicas: decision.current_replicas,
            to_replicas: reached_replicas,
            from_shape: decision.current_shape.clone(),
            to_shape: decision.current_shape.clone(),
            reason: decision.reason.clone(),
            success: false,
            error: Some(error),
            duration,
            cost_impact: None,
            timestamp: at,
        }
    }

    /// Assign an id derived from component, strategy and time if none is set.
    /// A process-wide sequence keeps ids distinct for identical timestamps.
    pub fn ensure_id(&mut self) -> &str {
        if self.id.is_empty() {
            let nanos = self
                .timestamp
                .timestamp_nanos_opt()
                .unwrap_or_else(|| self.timestamp.timestamp_micros().saturating_mul(1000));
            let seq = EVENT_SEQ.fetch_add(1, Ordering::Relaxed);
            self.id = format!("{}-{}-{}-{}", self.component, self.strategy, nanos, seq);
        }
        &self.id
    }
}

// ── Draining ───────────────────────────────────────────────────────

/// How to drain workloads during scale-down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadDrainConfig {
    pub max_unavailable: u32,
    pub max_surge: u32,
    #[serde(with = "crate::duration::serde_str")]
    pub drain_timeout: Duration,
    #[serde(with = "crate::duration::serde_str")]
    pub grace_period: Duration,
    pub evict_local_storage: bool,
    #[serde(with = "crate::duration::serde_str")]
    pub skip_wait_timeout: Duration,
}

impl WorkloadDrainConfig {
    pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5 * 60);
    pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

    /// Replace zero values with the defaults.
    pub fn normalized(mut self) -> Self {
        if self.drain_timeout.is_zero() {
            self.drain_timeout = Self::DEFAULT_DRAIN_TIMEOUT;
        }
        if self.grace_period.is_zero() {
            self.grace_period = Self::DEFAULT_GRACE_PERIOD;
        }
        if self.max_unavailable == 0 {
            self.max_unavailable = 1;
        }
        self
    }
}

impl Default for WorkloadDrainConfig {
    fn default() -> Self {
        Self {
            max_unavailable: 1,
            max_surge: 0,
            drain_timeout: Self::DEFAULT_DRAIN_TIMEOUT,
            grace_period: Self::DEFAULT_GRACE_PERIOD,
            evict_local_storage: false,
            skip_wait_timeout: Duration::ZERO,
        }
    }
}

/// Approximate drain snapshot, reconstructed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainStatus {
    pub component: Component,
    pub draining: BTreeSet<String>,
    pub completed: BTreeSet<String>,
    pub pending: BTreeSet<String>,
}

impl DrainStatus {
    pub fn empty(component: Component) -> Self {
        Self {
            component,
            draining: BTreeSet::new(),
            completed: BTreeSet::new(),
            pending: BTreeSet::new(),
        }
    }

    /// Pods still present: draining plus pending.
    pub fn total_pods(&self) -> usize {
        self.draining.len() + self.pending.len()
    }
}
