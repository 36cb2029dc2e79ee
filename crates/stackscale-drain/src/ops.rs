//! Cluster operations the drainer needs from the orchestration control plane.

use std::time::Duration;

use chrono::{DateTime, Utc};

use stackscale_core::{BoxFuture, Component};

/// What the drainer needs to know about one replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodInfo {
    pub name: String,
    /// Node the pod is scheduled on, if any.
    pub node_name: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Deletion already requested.
    pub terminating: bool,
    pub running: bool,
    /// The pod reports that its connections are drained.
    pub connections_drained: bool,
    /// The pod mounts node-local storage.
    pub local_storage: bool,
}

impl PodInfo {
    /// A running pod with no node and no special conditions.
    pub fn running(name: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            node_name: None,
            created_at,
            terminating: false,
            running: true,
            connections_drained: false,
            local_storage: false,
        }
    }

    pub fn on_node(mut self, node: &str) -> Self {
        self.node_name = Some(node.to_string());
        self
    }
}

/// Result of an eviction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictOutcome {
    Evicted,
    /// The pod no longer exists.
    AlreadyGone,
}

/// Live status of the component's disruption budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisruptionBudget {
    pub current_healthy: u32,
    pub desired_healthy: u32,
}

impl DisruptionBudget {
    /// Another disruption is allowed only while healthy pods exceed the desired count.
    pub fn allows_disruption(&self) -> bool {
        self.current_healthy > self.desired_healthy
    }
}

/// A pod lifecycle event reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionEvent {
    pub pod: String,
    /// Control-plane reason, e.g. `Killing`.
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Narrow control-plane interface. Implementations must be idempotent:
/// evicting, cordoning or uncordoning twice is not an error.
pub trait ClusterOps: Send + Sync {
    fn list_pods(&self, component: Component) -> BoxFuture<'_, anyhow::Result<Vec<PodInfo>>>;

    fn evict<'a>(
        &'a self,
        pod: &'a PodInfo,
        grace_period: Duration,
    ) -> BoxFuture<'a, anyhow::Result<EvictOutcome>>;

    fn pod_exists<'a>(
        &'a self,
        component: Component,
        pod: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<bool>>;

    fn cordon<'a>(&'a self, node: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;

    fn uncordon<'a>(&'a self, node: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;

    /// `None` when the component has no disruption budget.
    fn disruption_budget(
        &self,
        component: Component,
    ) -> BoxFuture<'_, anyhow::Result<Option<DisruptionBudget>>>;

    /// Pod events for the component at or after `since`.
    fn recent_eviction_events(
        &self,
        component: Component,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, anyhow::Result<Vec<EvictionEvent>>>;
}
