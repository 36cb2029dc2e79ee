//! ScalingCoordinator — one decision per component per cycle.
//!
//! Reactive strategies (horizontal, vertical) are materialized by the
//! host's native autoscaler objects, so the coordinator only produces
//! predictive and cost-aware decisions. Scale-down always goes through the
//! drainer before the replica count is lowered.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use stackscale_core::metrics::names;
use stackscale_core::{
    AutoscalingConfig, Component, DrainStatus, MetricsSink, MetricsSource, NoopMetrics,
    ResourceKind, ScalingDecision, ScalingEvent, ScalingPolicy, StrategyKind, WorkloadControl,
    WorkloadDrainConfig,
};
use stackscale_cost::{CostAnalysis, CostModel};
use stackscale_drain::{ClusterOps, DrainError, DrainOutcome, DrainPhase, WorkloadDrainer};
use stackscale_events::{EventRecorder, ScalingReport};
use stackscale_predict::{PredictError, PredictiveEngine, replicas_for_load};

use crate::error::{ScaleError, ScaleResult};

/// Forecast load with `buffer_percent` headroom on top.
pub fn with_headroom(load: f64, buffer_percent: u32) -> f64 {
    load * (1.0 + buffer_percent as f64 / 100.0)
}

pub struct ScalingCoordinator {
    config: AutoscalingConfig,
    source: Arc<dyn MetricsSource>,
    workload: Arc<dyn WorkloadControl>,
    /// One engine per component; each owns its current model.
    engines: HashMap<Component, PredictiveEngine>,
    cost: CostModel,
    drainer: WorkloadDrainer,
    recorder: EventRecorder,
    metrics: Arc<dyn MetricsSink>,
    drain_deadline: Option<Duration>,
    draining: Mutex<HashSet<Component>>,
}

impl ScalingCoordinator {
    pub fn new(
        config: AutoscalingConfig,
        source: Arc<dyn MetricsSource>,
        workload: Arc<dyn WorkloadControl>,
        cluster: Arc<dyn ClusterOps>,
        recorder: EventRecorder,
    ) -> Self {
        let engines = Component::ALL
            .into_iter()
            .map(|component| {
                let engine = PredictiveEngine::new(config.model_kind)
                    .with_horizon(config.prediction_horizon);
                (component, engine)
            })
            .collect();
        let cost = CostModel::new(config.cost_provider, &config.region);

        info!(
            provider = %config.cost_provider,
            region = %config.region,
            model = %config.model_kind,
            policies = config.policies.len(),
            "scaling coordinator created"
        );

        Self {
            config,
            source,
            workload,
            engines,
            cost,
            drainer: WorkloadDrainer::new(cluster),
            recorder,
            metrics: Arc::new(NoopMetrics),
            drain_deadline: None,
            draining: Mutex::new(HashSet::new()),
        }
    }

    /// Publish coordinator and drainer metrics to `metrics`. The recorder
    /// keeps whatever sink it was built with.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.drainer = self.drainer.with_metrics(Arc::clone(&metrics));
        self.metrics = metrics;
        self
    }

    /// Bound every drain started by this coordinator.
    pub fn with_drain_deadline(mut self, deadline: Duration) -> Self {
        self.drain_deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &AutoscalingConfig {
        &self.config
    }

    pub fn engine(&self, component: Component) -> &PredictiveEngine {
        &self.engines[&component]
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost
    }

    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }

    // ── Evaluation ─────────────────────────────────────────────────

    /// Evaluate one component. `None` means no decision this cycle.
    pub async fn evaluate(&self, component: Component) -> ScaleResult<Option<ScalingDecision>> {
        if !self.config.enabled {
            debug!(component = %component, "autoscaling disabled");
            return Ok(None);
        }
        let Some(policy) = self.config.policy(component) else {
            debug!(component = %component, "no scaling policy");
            return Ok(None);
        };

        self.observe_signals(component, policy).await;

        let decision = match policy.strategy {
            kind if kind.is_reactive() => {
                debug!(component = %component, strategy = %kind, "reactive strategy handled by native autoscaler");
                None
            }
            StrategyKind::Predictive if self.config.predictive_enabled => {
                self.evaluate_predictive(component, policy).await?
            }
            StrategyKind::CostAware if self.config.cost_aware_enabled => {
                self.evaluate_cost_aware(component, policy).await?
            }
            kind => {
                debug!(component = %component, strategy = %kind, "strategy disabled");
                None
            }
        };

        if let Some(decision) = &decision {
            self.metrics.set_gauge(
                names::TARGET_REPLICAS,
                &[("component", component.as_str())],
                decision.target_replicas as f64,
            );
            info!(
                component = %component,
                strategy = %decision.strategy,
                current = decision.current_replicas,
                target = decision.target_replicas,
                shape = ?decision.target_shape.as_ref().map(|s| s.name.as_str()),
                reason = %decision.reason,
                "scaling decision"
            );
        }
        Ok(decision)
    }

    /// Record current utilization and custom metrics. Failures only log.
    async fn observe_signals(&self, component: Component, policy: &ScalingPolicy) {
        let labels = [("component", component.as_str())];
        for (kind, series) in [
            (ResourceKind::Cpu, names::CPU_UTILIZATION_PERCENT),
            (ResourceKind::Memory, names::MEMORY_UTILIZATION_PERCENT),
        ] {
            match self.source.current_utilization(component, kind).await {
                Ok(value) => self.metrics.set_gauge(series, &labels, value),
                Err(e) => {
                    warn!(component = %component, resource = kind.as_str(), error = %e, "utilization unavailable")
                }
            }
        }

        for spec in &policy.custom_metrics {
            match self.source.custom_metric(component, spec).await {
                Ok(value) => self.metrics.set_gauge(
                    names::CUSTOM_METRIC_VALUE,
                    &[("component", component.as_str()), ("metric", spec.name.as_str())],
                    value,
                ),
                Err(e) => {
                    warn!(component = %component, metric = %spec.name, error = %e, "custom metric unavailable")
                }
            }
        }
    }

    async fn evaluate_predictive(
        &self,
        component: Component,
        policy: &ScalingPolicy,
    ) -> ScaleResult<Option<ScalingDecision>> {
        let labels = [("component", component.as_str())];

        let series = match self
            .source
            .historical_series(component, self.config.history_window)
            .await
        {
            Ok(series) => series,
            Err(e) => {
                warn!(component = %component, error = %e, "history unavailable, skipping prediction");
                return Ok(None);
            }
        };

        let engine = self.engine(component);
        let model = match engine.train(&series) {
            Ok(model) => model,
            Err(PredictError::InsufficientData { needed, got }) => {
                info!(component = %component, needed, got, "not enough history to forecast");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        self.metrics.set_gauge(
            names::PREDICTION_ACCURACY_PERCENT,
            &[("component", component.as_str()), ("model", model.kind.as_str())],
            model.accuracy * 100.0,
        );

        let current = self.current_replicas(component).await?;
        let horizon = self.config.prediction_horizon;
        let peak = engine.forecast_peak(horizon)?;
        let mut decision = engine.decision_for_peak(component, current, horizon, peak);
        self.metrics.set_gauge(names::PREDICTED_LOAD, &labels, peak);

        if policy.resource_buffer_percent > 0 {
            decision.target_replicas =
                replicas_for_load(with_headroom(peak, policy.resource_buffer_percent));
            decision.reason = format!(
                "{} with {}% headroom",
                decision.reason, policy.resource_buffer_percent
            );
        }
        decision.target_replicas = self.enforce_bounds(component, policy, decision.target_replicas);

        match self.workload.current_shape(component).await {
            Ok(shape) => {
                let impact = self
                    .cost
                    .impact(component, current, decision.target_replicas, &shape);
                self.metrics
                    .set_gauge(names::MONTHLY_COST_USD, &labels, impact.current_cost);
                decision.current_shape = Some(shape);
                decision.cost_impact = Some(impact);
            }
            Err(e) => {
                warn!(component = %component, error = %e, "current shape unavailable, no cost impact")
            }
        }

        Ok(Some(decision))
    }

    async fn evaluate_cost_aware(
        &self,
        component: Component,
        policy: &ScalingPolicy,
    ) -> ScaleResult<Option<ScalingDecision>> {
        if self.is_draining(component) {
            info!(component = %component, "drain in progress, deferring cost-aware decision");
            return Ok(None);
        }

        let current = self.current_replicas(component).await?;
        let shape = match self.workload.current_shape(component).await {
            Ok(shape) => Some(shape),
            Err(e) => {
                warn!(component = %component, error = %e, "current shape unavailable");
                None
            }
        };

        let budget = policy.cost_threshold.unwrap_or(self.config.default_budget);
        let decision = self.cost.find_optimal_in(
            component,
            current,
            shape.as_ref(),
            budget,
            policy.min_replicas..=policy.effective_max(),
        )?;

        if let Some(impact) = &decision.cost_impact {
            self.metrics.set_gauge(
                names::MONTHLY_COST_USD,
                &[("component", component.as_str())],
                impact.current_cost,
            );
        }
        Ok(Some(decision))
    }

    /// Clamp into the policy bounds, counting every clamp.
    fn enforce_bounds(&self, component: Component, policy: &ScalingPolicy, target: u32) -> u32 {
        let clamped = policy.clamp(target);
        if clamped != target {
            let bound = if target < policy.min_replicas { "min" } else { "max" };
            self.metrics.incr_counter(
                names::POLICY_VIOLATIONS_TOTAL,
                &[("component", component.as_str()), ("bound", bound)],
                1.0,
            );
            info!(component = %component, target, clamped, bound, "target clamped to policy bounds");
        }
        clamped
    }

    async fn current_replicas(&self, component: Component) -> ScaleResult<u32> {
        let replicas = self
            .workload
            .current_replicas(component)
            .await
            .map_err(|e| ScaleError::workload(component, e))?;
        self.metrics.set_gauge(
            names::REPLICAS,
            &[("component", component.as_str())],
            replicas as f64,
        );
        Ok(replicas)
    }

    // ── Execution ──────────────────────────────────────────────────

    /// Apply a decision and record what happened.
    ///
    /// A failed action still yields an event (with `success == false`);
    /// only a failure to record it is returned as an error.
    pub async fn execute(&self, decision: &ScalingDecision) -> ScaleResult<ScalingEvent> {
        let component = decision.component;
        let started = Instant::now();
        info!(
            component = %component,
            strategy = %decision.strategy,
            from = decision.current_replicas,
            to = decision.target_replicas,
            "executing scaling decision"
        );

        let event = match self.apply(decision).await {
            Ok(None) => ScalingEvent::succeeded(decision, started.elapsed(), Utc::now()),
            Ok(Some(shortfall)) => {
                warn!(component = %component, reached = shortfall.reached, error = %shortfall.message, "scale-down incomplete");
                ScalingEvent::failed(
                    decision,
                    shortfall.reached,
                    shortfall.message,
                    started.elapsed(),
                    Utc::now(),
                )
            }
            Err(e) => {
                warn!(component = %component, error = %e, "scaling decision failed");
                let reached = self
                    .workload
                    .current_replicas(component)
                    .await
                    .unwrap_or(decision.current_replicas);
                ScalingEvent::failed(decision, reached, e.to_string(), started.elapsed(), Utc::now())
            }
        };

        Ok(self.recorder.record(event)?)
    }

    /// `Some` when a scale-down drained fewer pods than requested.
    async fn apply(&self, decision: &ScalingDecision) -> ScaleResult<Option<Shortfall>> {
        let component = decision.component;

        if decision.is_scale_down() {
            let outcome = self
                .run_drain(component, decision.target_replicas, &self.config.drain)
                .await?;
            if !outcome.is_complete() {
                let reached = outcome.achieved_replicas();
                if reached != decision.current_replicas {
                    self.scale(component, reached).await?;
                }
                return Ok(Some(Shortfall {
                    reached,
                    message: shortfall_message(&outcome),
                }));
            }
        }

        if decision.target_replicas != decision.current_replicas {
            self.scale(component, decision.target_replicas).await?;
        }

        if let Some(shape) = &decision.target_shape
            && decision
                .current_shape
                .as_ref()
                .is_none_or(|current| !current.same_resources(shape))
        {
            self.workload
                .resize(component, shape.clone())
                .await
                .map_err(|e| ScaleError::workload(component, e))?;
            info!(component = %component, shape = %shape.name, "resources resized");
        }

        Ok(None)
    }

    async fn scale(&self, component: Component, replicas: u32) -> ScaleResult<()> {
        self.workload
            .scale(component, replicas)
            .await
            .map_err(|e| ScaleError::workload(component, e))?;
        self.metrics.set_gauge(
            names::REPLICAS,
            &[("component", component.as_str())],
            replicas as f64,
        );
        info!(component = %component, replicas, "replicas scaled");
        Ok(())
    }

    // ── Draining ───────────────────────────────────────────────────

    /// Drain `component` to `target_replicas` and report the resulting
    /// drain state. Pods removed by this call are listed as completed.
    pub async fn drain(
        &self,
        component: Component,
        target_replicas: u32,
        config: &WorkloadDrainConfig,
    ) -> ScaleResult<DrainStatus> {
        let outcome = self.run_drain(component, target_replicas, config).await?;
        let mut status = self.drainer.get_drain_status(component).await?;
        status.completed.extend(outcome.drained);
        Ok(status)
    }

    pub async fn get_drain_status(&self, component: Component) -> ScaleResult<DrainStatus> {
        Ok(self.drainer.get_drain_status(component).await?)
    }

    /// Whether a drain started by this coordinator is running.
    pub fn is_draining(&self, component: Component) -> bool {
        self.draining
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&component)
    }

    async fn run_drain(
        &self,
        component: Component,
        target_replicas: u32,
        config: &WorkloadDrainConfig,
    ) -> ScaleResult<DrainOutcome> {
        let _guard = DrainGuard::acquire(&self.draining, component)?;
        let deadline = self.drain_deadline.map(|d| Instant::now() + d);
        Ok(self
            .drainer
            .drain_until(component, target_replicas, config, deadline)
            .await?)
    }

    // ── History ────────────────────────────────────────────────────

    /// Aggregate report over the trailing `window`.
    pub fn report(&self, window: Duration) -> ScaleResult<ScalingReport> {
        Ok(self.recorder.generate_report(window)?)
    }

    pub fn events(
        &self,
        component: Option<Component>,
        window: Duration,
    ) -> ScaleResult<Vec<ScalingEvent>> {
        Ok(self.recorder.list(component, window)?)
    }

    /// Cost trend of `component` over the trailing `window`.
    pub fn analyze_costs(&self, component: Component, window: Duration) -> ScaleResult<CostAnalysis> {
        let history = self.recorder.list(Some(component), window)?;
        Ok(self.cost.analyze_trend(component, &history)?)
    }

    /// Apply the configured event retention.
    pub fn cleanup(&self) -> ScaleResult<usize> {
        Ok(self.recorder.cleanup(self.config.event_retention)?)
    }
}

struct Shortfall {
    reached: u32,
    message: String,
}

fn shortfall_message(outcome: &DrainOutcome) -> String {
    let mut message = format!(
        "drained {} of {} pods",
        outcome.drained.len(),
        outcome.requested()
    );
    if outcome.phase == DrainPhase::TimedOut {
        message.push_str(": drain deadline reached");
    } else if let Some(reason) = &outcome.stopped_early {
        message.push_str(": ");
        message.push_str(reason);
    } else if let Some((pod, error)) = outcome.failed.first() {
        message.push_str(&format!(": {pod}: {error}"));
    }
    message
}

/// Marks a component as draining until dropped.
struct DrainGuard<'a> {
    draining: &'a Mutex<HashSet<Component>>,
    component: Component,
}

impl<'a> DrainGuard<'a> {
    fn acquire(
        draining: &'a Mutex<HashSet<Component>>,
        component: Component,
    ) -> Result<Self, DrainError> {
        let mut set = draining.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(component) {
            return Err(DrainError::Disallowed {
                reason: format!("a drain of {component} is already in progress"),
            });
        }
        Ok(Self {
            draining,
            component,
        })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.draining
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.component);
    }
}
