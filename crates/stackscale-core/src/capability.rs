//! Capabilities the autoscaling core consumes from its host.
//!
//! The core never talks to the orchestration control plane or a metrics
//! backend directly. The host operator injects implementations of these
//! traits; tests inject fakes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::types::{Component, CustomMetricSpec, MetricDataPoint, ResourceShape};

/// Boxed future returned by capability methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Resource dimension for utilization lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Cpu,
    Memory,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
        }
    }
}

/// Point-in-time and historical utilization per component.
///
/// Any failure degrades the evaluation cycle to "no signal".
pub trait MetricsSource: Send + Sync {
    /// Current utilization as a percentage of the requested resource.
    fn current_utilization(
        &self,
        component: Component,
        kind: ResourceKind,
    ) -> BoxFuture<'_, anyhow::Result<f64>>;

    /// Current value of a custom metric.
    fn custom_metric<'a>(
        &'a self,
        component: Component,
        spec: &'a CustomMetricSpec,
    ) -> BoxFuture<'a, anyhow::Result<f64>>;

    /// Load samples covering the trailing `window`.
    fn historical_series(
        &self,
        component: Component,
        window: Duration,
    ) -> BoxFuture<'_, anyhow::Result<Vec<MetricDataPoint>>>;
}

/// Reads and changes the replica count and resources of a component.
pub trait WorkloadControl: Send + Sync {
    fn current_replicas(&self, component: Component) -> BoxFuture<'_, anyhow::Result<u32>>;

    fn current_shape(&self, component: Component) -> BoxFuture<'_, anyhow::Result<ResourceShape>>;

    fn scale(&self, component: Component, replicas: u32) -> BoxFuture<'_, anyhow::Result<()>>;

    fn resize(
        &self,
        component: Component,
        shape: ResourceShape,
    ) -> BoxFuture<'_, anyhow::Result<()>>;
}
