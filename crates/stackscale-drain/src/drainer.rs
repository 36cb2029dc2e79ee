//! WorkloadDrainer — drives one scale-down through the drain state machine.
//!
//! All waits (connection drain, eviction poll, inter-pod pause) run on the
//! tokio clock and honour an optional deadline. A deadline that fires
//! mid-pod still uncordons the node before returning.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, warn};

use stackscale_core::metrics::names;
use stackscale_core::{
    Component, DrainStatus, MetricsSink, NoopMetrics, WorkloadDrainConfig,
};

use crate::error::{DrainError, DrainResult};
use crate::ops::{ClusterOps, DisruptionBudget, EvictOutcome, PodInfo};

/// Pause between successive pod drains.
pub const DRAIN_PAUSE: Duration = Duration::from_secs(10);

/// Interval between checks that an evicted pod is gone.
pub const EVICTION_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How far back eviction events count towards a drain status.
const STATUS_EVENT_WINDOW: TimeDelta = TimeDelta::minutes(5);

/// Control-plane event reason emitted when a pod is being stopped.
const KILLING_REASON: &str = "Killing";

/// Time a component gets to finish in-flight work before eviction.
pub fn connection_drain_delay(component: Component) -> Duration {
    match component {
        Component::MetricsCollector => Duration::from_secs(20),
        Component::DashboardService => Duration::from_secs(15),
        Component::LogStore => Duration::from_secs(30),
        Component::TraceStore => Duration::from_secs(30),
    }
}

/// Whether one more replica may be taken down.
///
/// Refused when a disruption budget has no headroom, or when removing a
/// replica would go below `max(1, remaining − max_unavailable)`.
pub fn can_drain(
    budget: Option<DisruptionBudget>,
    remaining: u32,
    max_unavailable: u32,
) -> DrainResult<()> {
    if let Some(budget) = budget
        && !budget.allows_disruption()
    {
        return Err(DrainError::Disallowed {
            reason: format!(
                "disruption budget has no headroom ({} healthy, {} desired)",
                budget.current_healthy, budget.desired_healthy
            ),
        });
    }

    let min_available = remaining.saturating_sub(max_unavailable).max(1);
    if remaining > min_available {
        Ok(())
    } else {
        Err(DrainError::Disallowed {
            reason: format!(
                "{remaining} replicas remaining, {min_available} must stay available"
            ),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPhase {
    Requested,
    Selecting,
    Draining,
    Verifying,
    Completed,
    TimedOut,
}

/// What a drain achieved. A partial drain is a normal outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainOutcome {
    pub component: Component,
    pub phase: DrainPhase,
    pub initial_replicas: u32,
    pub target_replicas: u32,
    /// Pods removed, in drain order.
    pub drained: Vec<String>,
    /// Pods whose drain failed and were skipped.
    pub failed: Vec<(String, DrainError)>,
    /// Why draining stopped before reaching the target, if it did.
    pub stopped_early: Option<String>,
    /// Live, non-terminating pods after verification.
    pub remaining_replicas: u32,
    pub elapsed: Duration,
}

impl DrainOutcome {
    /// Pods the drain set out to remove.
    pub fn requested(&self) -> u32 {
        self.initial_replicas.saturating_sub(self.target_replicas)
    }

    pub fn shortfall(&self) -> u32 {
        self.requested().saturating_sub(self.drained.len() as u32)
    }

    /// Replica count reached by this drain.
    pub fn achieved_replicas(&self) -> u32 {
        self.initial_replicas.saturating_sub(self.drained.len() as u32)
    }

    pub fn is_complete(&self) -> bool {
        self.phase == DrainPhase::Completed && self.shortfall() == 0
    }
}

pub struct WorkloadDrainer {
    ops: Arc<dyn ClusterOps>,
    metrics: Arc<dyn MetricsSink>,
    pause: Duration,
    poll_interval: Duration,
}

impl WorkloadDrainer {
    pub fn new(ops: Arc<dyn ClusterOps>) -> Self {
        Self {
            ops,
            metrics: Arc::new(NoopMetrics),
            pause: DRAIN_PAUSE,
            poll_interval: EVICTION_POLL_INTERVAL,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Drain `component` down to `target_replicas`.
    pub async fn drain(
        &self,
        component: Component,
        target_replicas: u32,
        config: &WorkloadDrainConfig,
    ) -> DrainResult<DrainOutcome> {
        self.drain_until(component, target_replicas, config, None)
            .await
    }

    /// Drain with an overall deadline. Hitting it ends in `TimedOut`.
    pub async fn drain_until(
        &self,
        component: Component,
        target_replicas: u32,
        config: &WorkloadDrainConfig,
        deadline: Option<Instant>,
    ) -> DrainResult<DrainOutcome> {
        let started = Instant::now();
        let config = config.clone().normalized();
        let mut phase = DrainPhase::Requested;
        info!(component = %component, target_replicas, "drain requested");

        self.transition(component, &mut phase, DrainPhase::Selecting);
        let mut pods = self.ops.list_pods(component).await?;
        let initial_replicas = pods.len() as u32;

        let mut outcome = DrainOutcome {
            component,
            phase,
            initial_replicas,
            target_replicas,
            drained: Vec::new(),
            failed: Vec::new(),
            stopped_early: None,
            remaining_replicas: initial_replicas,
            elapsed: Duration::ZERO,
        };

        if initial_replicas <= target_replicas {
            info!(
                component = %component,
                current = initial_replicas,
                target_replicas,
                "no pods to drain"
            );
            outcome.phase = DrainPhase::Completed;
            return Ok(outcome);
        }

        // Newest first.
        pods.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let to_drain = initial_replicas - target_replicas;

        self.transition(component, &mut phase, DrainPhase::Draining);
        let labels = [("component", component.as_str())];
        let mut timed_out = false;
        // Only pods not already terminating keep the component available.
        let mut healthy = pods.iter().filter(|p| !p.terminating).count() as u32;

        for pod in &pods {
            let drained = outcome.drained.len() as u32;
            if drained >= to_drain {
                break;
            }
            if pod.terminating {
                debug!(pod = %pod.name, "pod already terminating");
                outcome.drained.push(pod.name.clone());
                continue;
            }

            let budget = match self.ops.disruption_budget(component).await {
                Ok(budget) => budget,
                Err(e) => {
                    warn!(component = %component, error = %e, "disruption budget lookup failed");
                    None
                }
            };
            if let Err(e) = can_drain(budget, healthy, config.max_unavailable) {
                info!(component = %component, drained, reason = %e, "stopping drain early");
                outcome.stopped_early = Some(e.to_string());
                break;
            }

            self.metrics.set_gauge(names::DRAINING_PODS, &labels, 1.0);
            let result = self.drain_pod(component, pod, &config, deadline).await;
            self.metrics.set_gauge(names::DRAINING_PODS, &labels, 0.0);

            match result {
                Ok(()) => {
                    healthy -= 1;
                    outcome.drained.push(pod.name.clone());
                }
                Err(DrainError::Cancelled) => {
                    timed_out = true;
                    break;
                }
                Err(e) => {
                    // A timed-out pod was still evicted and is on its way out.
                    if matches!(e, DrainError::Timeout { .. }) {
                        healthy -= 1;
                    }
                    warn!(component = %component, pod = %pod.name, error = %e, "pod drain failed, skipping");
                    outcome.failed.push((pod.name.clone(), e));
                    continue;
                }
            }

            if (outcome.drained.len() as u32) < to_drain && !self.pause_until(deadline).await {
                timed_out = true;
                break;
            }
        }

        if timed_out {
            self.transition(component, &mut phase, DrainPhase::TimedOut);
            outcome.remaining_replicas = outcome.achieved_replicas();
        } else {
            self.transition(component, &mut phase, DrainPhase::Verifying);
            outcome.remaining_replicas = match self.ops.list_pods(component).await {
                Ok(live) => live.iter().filter(|p| !p.terminating).count() as u32,
                Err(e) => {
                    warn!(component = %component, error = %e, "could not verify drain");
                    outcome.achieved_replicas()
                }
            };
            self.transition(component, &mut phase, DrainPhase::Completed);
        }

        outcome.phase = phase;
        outcome.elapsed = started.elapsed();
        self.metrics.observe(
            names::DRAIN_DURATION_SECONDS,
            &labels,
            outcome.elapsed.as_secs_f64(),
        );

        info!(
            component = %component,
            phase = ?outcome.phase,
            drained = outcome.drained.len(),
            failed = outcome.failed.len(),
            remaining = outcome.remaining_replicas,
            elapsed_secs = outcome.elapsed.as_secs(),
            "drain finished"
        );
        Ok(outcome)
    }

    /// Drain a single pod. The pod's node is uncordoned on every path.
    pub async fn drain_pod(
        &self,
        component: Component,
        pod: &PodInfo,
        config: &WorkloadDrainConfig,
        deadline: Option<Instant>,
    ) -> DrainResult<()> {
        if pod.terminating {
            debug!(pod = %pod.name, "pod already terminating");
            return Ok(());
        }
        if pod.local_storage && !config.evict_local_storage {
            return Err(DrainError::Disallowed {
                reason: format!("pod {} uses local storage", pod.name),
            });
        }

        info!(component = %component, pod = %pod.name, node = ?pod.node_name, "draining pod");

        let cordon = pod
            .node_name
            .as_deref()
            .map(|node| CordonGuard::new(Arc::clone(&self.ops), node));
        if let Some(node) = &pod.node_name
            && let Err(e) = self.ops.cordon(node).await
        {
            warn!(node = %node, error = %e, "failed to cordon node");
        }

        let result = match deadline {
            Some(deadline) => timeout_at(deadline, self.evict_and_wait(component, pod, config))
                .await
                .unwrap_or(Err(DrainError::Cancelled)),
            None => self.evict_and_wait(component, pod, config).await,
        };

        if let Some(cordon) = cordon {
            cordon.release().await;
        }

        if result.is_ok() {
            info!(pod = %pod.name, "pod drained");
        }
        result
    }

    /// Reconstruct an approximate drain snapshot from live pods and
    /// recent eviction events.
    pub async fn get_drain_status(&self, component: Component) -> DrainResult<DrainStatus> {
        let pods = self.ops.list_pods(component).await?;
        let mut status = DrainStatus::empty(component);

        for pod in pods {
            if pod.terminating {
                status.draining.insert(pod.name);
            } else if pod.running {
                status.pending.insert(pod.name);
            }
        }

        let since = Utc::now() - STATUS_EVENT_WINDOW;
        match self.ops.recent_eviction_events(component, since).await {
            Ok(events) => {
                for event in events {
                    if event.reason == KILLING_REASON && event.timestamp > since {
                        status.completed.insert(event.pod);
                    }
                }
            }
            Err(e) => warn!(component = %component, error = %e, "could not list eviction events"),
        }

        Ok(status)
    }

    async fn evict_and_wait(
        &self,
        component: Component,
        pod: &PodInfo,
        config: &WorkloadDrainConfig,
    ) -> DrainResult<()> {
        if pod.connections_drained {
            debug!(pod = %pod.name, "connections already drained");
        } else {
            let delay = connection_drain_delay(component);
            debug!(pod = %pod.name, delay_secs = delay.as_secs(), "waiting for connections to drain");
            sleep(delay).await;
        }

        match self.ops.evict(pod, config.grace_period).await? {
            EvictOutcome::AlreadyGone => {
                debug!(pod = %pod.name, "pod already gone");
                return Ok(());
            }
            EvictOutcome::Evicted => {}
        }

        self.wait_for_deletion(component, pod, config).await
    }

    async fn wait_for_deletion(
        &self,
        component: Component,
        pod: &PodInfo,
        config: &WorkloadDrainConfig,
    ) -> DrainResult<()> {
        let started = Instant::now();
        loop {
            if !self.ops.pod_exists(component, &pod.name).await? {
                return Ok(());
            }

            let waited = started.elapsed();
            if !config.skip_wait_timeout.is_zero() && waited >= config.skip_wait_timeout {
                info!(pod = %pod.name, waited_secs = waited.as_secs(), "no longer waiting for pod deletion");
                return Ok(());
            }
            if waited >= config.drain_timeout {
                return Err(DrainError::Timeout {
                    pod: pod.name.clone(),
                    waited,
                });
            }

            sleep(self.poll_interval.min(config.drain_timeout - waited)).await;
        }
    }

    /// Sleep for the inter-pod pause; false if the deadline cut it short.
    async fn pause_until(&self, deadline: Option<Instant>) -> bool {
        match deadline {
            Some(deadline) => timeout_at(deadline, sleep(self.pause)).await.is_ok(),
            None => {
                sleep(self.pause).await;
                true
            }
        }
    }

    fn transition(&self, component: Component, phase: &mut DrainPhase, next: DrainPhase) {
        debug!(component = %component, from = ?phase, to = ?next, "drain phase");
        *phase = next;
    }
}

/// Keeps a node cordoned for the duration of one pod drain.
///
/// `release` uncordons in line. If the drain future is dropped first, the
/// uncordon is spawned onto the current runtime instead.
struct CordonGuard {
    ops: Arc<dyn ClusterOps>,
    node: Option<String>,
}

impl CordonGuard {
    fn new(ops: Arc<dyn ClusterOps>, node: &str) -> Self {
        Self {
            ops,
            node: Some(node.to_string()),
        }
    }

    async fn release(mut self) {
        if let Some(node) = self.node.take()
            && let Err(e) = self.ops.uncordon(&node).await
        {
            warn!(node = %node, error = %e, "failed to uncordon node");
        }
    }
}

impl Drop for CordonGuard {
    fn drop(&mut self) {
        let Some(node) = self.node.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(node = %node, "drain cancelled outside a runtime, node left cordoned");
            return;
        };
        let ops = Arc::clone(&self.ops);
        handle.spawn(async move {
            match ops.uncordon(&node).await {
                Ok(()) => info!(node = %node, "node uncordoned after cancelled drain"),
                Err(e) => warn!(node = %node, error = %e, "failed to uncordon node"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use chrono::{DateTime, TimeZone};
    use stackscale_core::BoxFuture;
    use stackscale_metrics::MetricsRegistry;

    use crate::ops::EvictionEvent;

    #[derive(Default)]
    struct FakeState {
        pods: Vec<PodInfo>,
        /// Evicted but never disappear.
        stuck: HashSet<String>,
        /// Eviction reports the pod as already gone.
        vanished: HashSet<String>,
        budget: Option<DisruptionBudget>,
        cordoned: HashSet<String>,
        cordon_calls: u32,
        /// (pod, live non-terminating pods when the eviction was issued).
        evictions: Vec<(String, u32)>,
        evicted_at: Vec<Instant>,
        events: Vec<EvictionEvent>,
        fail_listing: bool,
    }

    #[derive(Default)]
    struct FakeCluster {
        state: Mutex<FakeState>,
    }

    impl FakeCluster {
        fn with_pods(pods: Vec<PodInfo>) -> Arc<Self> {
            let cluster = Self::default();
            cluster.state.lock().unwrap().pods = pods;
            Arc::new(cluster)
        }

        fn live(&self) -> Vec<String> {
            let state = self.state.lock().unwrap();
            state
                .pods
                .iter()
                .filter(|p| !p.terminating)
                .map(|p| p.name.clone())
                .collect()
        }
    }

    impl ClusterOps for FakeCluster {
        fn list_pods(&self, _component: Component) -> BoxFuture<'_, anyhow::Result<Vec<PodInfo>>> {
            let state = self.state.lock().unwrap();
            let result = if state.fail_listing {
                Err(anyhow::anyhow!("api server unreachable"))
            } else {
                Ok(state.pods.clone())
            };
            Box::pin(std::future::ready(result))
        }

        fn evict<'a>(
            &'a self,
            pod: &'a PodInfo,
            _grace_period: Duration,
        ) -> BoxFuture<'a, anyhow::Result<EvictOutcome>> {
            let mut state = self.state.lock().unwrap();
            let live = state.pods.iter().filter(|p| !p.terminating).count() as u32;
            state.evictions.push((pod.name.clone(), live));
            state.evicted_at.push(Instant::now());

            let outcome = if state.vanished.contains(&pod.name) {
                state.pods.retain(|p| p.name != pod.name);
                EvictOutcome::AlreadyGone
            } else if state.stuck.contains(&pod.name) {
                if let Some(p) = state.pods.iter_mut().find(|p| p.name == pod.name) {
                    p.terminating = true;
                }
                EvictOutcome::Evicted
            } else {
                state.pods.retain(|p| p.name != pod.name);
                EvictOutcome::Evicted
            };
            Box::pin(std::future::ready(Ok(outcome)))
        }

        fn pod_exists<'a>(
            &'a self,
            _component: Component,
            pod: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<bool>> {
            let state = self.state.lock().unwrap();
            let exists = state.pods.iter().any(|p| p.name == pod);
            Box::pin(std::future::ready(Ok(exists)))
        }

        fn cordon<'a>(&'a self, node: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
            let mut state = self.state.lock().unwrap();
            state.cordon_calls += 1;
            state.cordoned.insert(node.to_string());
            Box::pin(std::future::ready(Ok(())))
        }

        fn uncordon<'a>(&'a self, node: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
            self.state.lock().unwrap().cordoned.remove(node);
            Box::pin(std::future::ready(Ok(())))
        }

        fn disruption_budget(
            &self,
            _component: Component,
        ) -> BoxFuture<'_, anyhow::Result<Option<DisruptionBudget>>> {
            let budget = self.state.lock().unwrap().budget;
            Box::pin(std::future::ready(Ok(budget)))
        }

        fn recent_eviction_events(
            &self,
            _component: Component,
            since: DateTime<Utc>,
        ) -> BoxFuture<'_, anyhow::Result<Vec<EvictionEvent>>> {
            let events: Vec<_> = self
                .state
                .lock()
                .unwrap()
                .events
                .iter()
                .filter(|e| e.timestamp >= since)
                .cloned()
                .collect();
            Box::pin(std::future::ready(Ok(events)))
        }
    }

    fn pods(n: usize) -> Vec<PodInfo> {
        let base = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                PodInfo::running(&format!("pod-{i}"), base + TimeDelta::minutes(i as i64))
                    .on_node(&format!("node-{i}"))
            })
            .collect()
    }

    fn config() -> WorkloadDrainConfig {
        WorkloadDrainConfig::default()
    }

    #[test]
    fn availability_floor() {
        assert!(can_drain(None, 5, 1).is_ok());
        assert!(can_drain(None, 2, 1).is_ok());
        assert!(matches!(
            can_drain(None, 1, 1),
            Err(DrainError::Disallowed { .. })
        ));
        assert!(can_drain(None, 1, 5).is_err());
        assert!(can_drain(None, 0, 1).is_err());
    }

    #[test]
    fn exhausted_budget_refuses() {
        let tight = DisruptionBudget {
            current_healthy: 3,
            desired_healthy: 3,
        };
        let loose = DisruptionBudget {
            current_healthy: 4,
            desired_healthy: 3,
        };
        assert!(can_drain(Some(tight), 4, 1).is_err());
        assert!(can_drain(Some(loose), 4, 1).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn drains_newest_first_one_at_a_time() {
        let cluster = FakeCluster::with_pods(pods(5));
        let drainer = WorkloadDrainer::new(cluster.clone());
        let started = Instant::now();

        let outcome = drainer
            .drain(Component::MetricsCollector, 2, &config())
            .await
            .unwrap();

        assert_eq!(outcome.phase, DrainPhase::Completed);
        assert!(outcome.is_complete());
        assert_eq!(outcome.drained, vec!["pod-4", "pod-3", "pod-2"]);
        assert_eq!(outcome.remaining_replicas, 2);
        assert_eq!(cluster.live(), vec!["pod-0", "pod-1"]);

        let state = cluster.state.lock().unwrap();
        let live_at_eviction: Vec<u32> = state.evictions.iter().map(|(_, n)| *n).collect();
        assert_eq!(live_at_eviction, vec![5, 4, 3]);

        // 20s connection drain per pod, 10s pause between pods.
        let gaps: Vec<Duration> = state
            .evicted_at
            .windows(2)
            .map(|w| w[1] - w[0])
            .collect();
        assert_eq!(gaps, vec![Duration::from_secs(30), Duration::from_secs(30)]);
        assert_eq!(started.elapsed(), Duration::from_secs(3 * 20 + 2 * 10));

        assert_eq!(state.cordon_calls, 3);
        assert!(state.cordoned.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn terminating_pods_do_not_count_as_available() {
        let mut list = pods(3);
        list[0].terminating = true;
        let cluster = FakeCluster::with_pods(list);
        let drainer = WorkloadDrainer::new(cluster.clone());

        let outcome = drainer
            .drain(Component::LogStore, 0, &config())
            .await
            .unwrap();

        assert_eq!(outcome.drained, vec!["pod-2"]);
        assert!(outcome.stopped_early.is_some());
        assert_eq!(cluster.live(), vec!["pod-1"]);
        let state = cluster.state.lock().unwrap();
        assert_eq!(state.evictions, vec![("pod-2".to_string(), 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_drain_still_uncordons() {
        let cluster = FakeCluster::with_pods(pods(3));
        let drainer = WorkloadDrainer::new(cluster.clone());

        let cut_short = tokio::time::timeout(
            Duration::from_secs(15),
            drainer.drain(Component::MetricsCollector, 1, &config()),
        )
        .await;
        assert!(cut_short.is_err());

        // Let the spawned uncordon run.
        sleep(Duration::from_millis(1)).await;
        let state = cluster.state.lock().unwrap();
        assert_eq!(state.cordon_calls, 1);
        assert!(state.cordoned.is_empty());
        assert!(state.evictions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_to_drain() {
        let cluster = FakeCluster::with_pods(pods(2));
        let drainer = WorkloadDrainer::new(cluster.clone());
        let outcome = drainer
            .drain(Component::LogStore, 3, &config())
            .await
            .unwrap();
        assert_eq!(outcome.phase, DrainPhase::Completed);
        assert_eq!(outcome.requested(), 0);
        assert!(cluster.state.lock().unwrap().evictions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn always_keeps_one_replica() {
        let cluster = FakeCluster::with_pods(pods(2));
        let drainer = WorkloadDrainer::new(cluster.clone());
        let outcome = drainer
            .drain(Component::DashboardService, 0, &config())
            .await
            .unwrap();

        assert_eq!(outcome.phase, DrainPhase::Completed);
        assert_eq!(outcome.drained.len(), 1);
        assert_eq!(outcome.shortfall(), 1);
        assert!(outcome.stopped_early.is_some());
        assert!(!outcome.is_complete());
        assert_eq!(cluster.live().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_without_headroom_stops_before_evicting() {
        let cluster = FakeCluster::with_pods(pods(4));
        cluster.state.lock().unwrap().budget = Some(DisruptionBudget {
            current_healthy: 4,
            desired_healthy: 4,
        });
        let drainer = WorkloadDrainer::new(cluster.clone());
        let outcome = drainer
            .drain(Component::TraceStore, 2, &config())
            .await
            .unwrap();

        assert!(outcome.drained.is_empty());
        assert_eq!(outcome.achieved_replicas(), 4);
        assert!(outcome.stopped_early.unwrap().contains("disruption budget"));
        assert!(cluster.state.lock().unwrap().evictions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn terminating_and_vanished_pods_count_as_drained() {
        let mut list = pods(4);
        list[3].terminating = true;
        let cluster = FakeCluster::with_pods(list);
        cluster.state.lock().unwrap().vanished.insert("pod-2".to_string());

        let drainer = WorkloadDrainer::new(cluster.clone());
        let outcome = drainer
            .drain(Component::LogStore, 2, &config())
            .await
            .unwrap();

        assert_eq!(outcome.drained, vec!["pod-3", "pod-2"]);
        let state = cluster.state.lock().unwrap();
        // pod-3 was already terminating and never evicted again.
        assert_eq!(state.evictions.len(), 1);
        assert_eq!(state.evictions[0].0, "pod-2");
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_pod_times_out_and_is_skipped() {
        let cluster = FakeCluster::with_pods(pods(3));
        cluster.state.lock().unwrap().stuck.insert("pod-2".to_string());
        let drainer = WorkloadDrainer::new(cluster.clone());
        let config = WorkloadDrainConfig {
            drain_timeout: Duration::from_secs(30),
            ..config()
        };

        let outcome = drainer
            .drain(Component::DashboardService, 2, &config)
            .await
            .unwrap();

        assert_eq!(outcome.failed.len(), 1);
        let (pod, err) = &outcome.failed[0];
        assert_eq!(pod, "pod-2");
        assert_eq!(
            *err,
            DrainError::Timeout {
                pod: "pod-2".to_string(),
                waited: Duration::from_secs(30)
            }
        );
        // The next-newest pod was drained instead.
        assert_eq!(outcome.drained, vec!["pod-1"]);
        assert!(cluster.state.lock().unwrap().cordoned.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn skip_wait_timeout_stops_polling() {
        let cluster = FakeCluster::with_pods(pods(2));
        cluster.state.lock().unwrap().stuck.insert("pod-1".to_string());
        let drainer = WorkloadDrainer::new(cluster.clone());
        let config = WorkloadDrainConfig {
            skip_wait_timeout: Duration::from_secs(10),
            ..config()
        };

        let outcome = drainer
            .drain(Component::LogStore, 1, &config)
            .await
            .unwrap();
        assert_eq!(outcome.drained, vec!["pod-1"]);
        assert_eq!(outcome.remaining_replicas, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_times_out_and_uncordons() {
        let cluster = FakeCluster::with_pods(pods(3));
        let drainer = WorkloadDrainer::new(cluster.clone());
        let deadline = Instant::now() + Duration::from_secs(15);

        let outcome = drainer
            .drain_until(Component::MetricsCollector, 1, &config(), Some(deadline))
            .await
            .unwrap();

        assert_eq!(outcome.phase, DrainPhase::TimedOut);
        assert!(outcome.drained.is_empty());
        assert_eq!(outcome.remaining_replicas, 3);
        let state = cluster.state.lock().unwrap();
        assert!(state.evictions.is_empty());
        assert_eq!(state.cordon_calls, 1);
        assert!(state.cordoned.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_pause() {
        let cluster = FakeCluster::with_pods(pods(3));
        let drainer = WorkloadDrainer::new(cluster.clone());
        let deadline = Instant::now() + Duration::from_secs(25);

        let outcome = drainer
            .drain_until(Component::MetricsCollector, 1, &config(), Some(deadline))
            .await
            .unwrap();

        assert_eq!(outcome.phase, DrainPhase::TimedOut);
        assert_eq!(outcome.drained, vec!["pod-2"]);
        assert_eq!(outcome.remaining_replicas, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn drained_connections_skip_the_wait() {
        let mut list = pods(2);
        for pod in &mut list {
            pod.connections_drained = true;
        }
        let cluster = FakeCluster::with_pods(list);
        let drainer = WorkloadDrainer::new(cluster);
        let started = Instant::now();

        drainer
            .drain(Component::LogStore, 1, &config())
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn local_storage_needs_opt_in() {
        let mut list = pods(2);
        list[1].local_storage = true;
        let cluster = FakeCluster::with_pods(list.clone());
        let drainer = WorkloadDrainer::new(cluster.clone());

        let outcome = drainer
            .drain(Component::TraceStore, 1, &config())
            .await
            .unwrap();
        assert!(matches!(
            outcome.failed[0].1,
            DrainError::Disallowed { .. }
        ));
        // The older pod went instead.
        assert_eq!(outcome.drained, vec!["pod-0"]);

        let cluster = FakeCluster::with_pods(list);
        let drainer = WorkloadDrainer::new(cluster.clone());
        let config = WorkloadDrainConfig {
            evict_local_storage: true,
            ..config()
        };
        let outcome = drainer
            .drain(Component::TraceStore, 1, &config)
            .await
            .unwrap();
        assert_eq!(outcome.drained, vec!["pod-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn listing_failure_is_a_cluster_error() {
        let cluster = FakeCluster::with_pods(pods(3));
        cluster.state.lock().unwrap().fail_listing = true;
        let drainer = WorkloadDrainer::new(cluster);
        let err = drainer
            .drain(Component::LogStore, 1, &config())
            .await
            .unwrap_err();
        assert!(matches!(err, DrainError::Cluster(msg) if msg.contains("unreachable")));
    }

    #[tokio::test(start_paused = true)]
    async fn drain_metrics_are_published() {
        let cluster = FakeCluster::with_pods(pods(2));
        let registry = Arc::new(MetricsRegistry::new());
        let drainer = WorkloadDrainer::new(cluster).with_metrics(registry.clone());

        drainer
            .drain(Component::LogStore, 1, &config())
            .await
            .unwrap();

        let labels = [("component", "log-store")];
        assert_eq!(registry.gauge(names::DRAINING_PODS, &labels), Some(0.0));
        let durations = registry
            .histogram(names::DRAIN_DURATION_SECONDS, &labels)
            .unwrap();
        assert_eq!(durations.count, 1);
        assert_eq!(durations.sum, 30.0);
    }

    #[tokio::test]
    async fn status_from_pods_and_recent_events() {
        let mut list = pods(3);
        list[0].terminating = true;
        list[2].running = false;
        let cluster = FakeCluster::with_pods(list);
        {
            let mut state = cluster.state.lock().unwrap();
            let now = Utc::now();
            state.events = vec![
                EvictionEvent {
                    pod: "old-1".to_string(),
                    reason: "Killing".to_string(),
                    timestamp: now - TimeDelta::minutes(1),
                },
                EvictionEvent {
                    pod: "old-2".to_string(),
                    reason: "Scheduled".to_string(),
                    timestamp: now - TimeDelta::minutes(1),
                },
                EvictionEvent {
                    pod: "old-3".to_string(),
                    reason: "Killing".to_string(),
                    timestamp: now - TimeDelta::minutes(30),
                },
            ];
        }
        let drainer = WorkloadDrainer::new(cluster);
        let status = drainer
            .get_drain_status(Component::MetricsCollector)
            .await
            .unwrap();

        assert_eq!(status.draining.len(), 1);
        assert!(status.draining.contains("pod-0"));
        assert!(status.pending.contains("pod-1"));
        assert_eq!(status.total_pods(), 2);
        assert_eq!(status.completed.len(), 1);
        assert!(status.completed.contains("old-1"));
    }
}
