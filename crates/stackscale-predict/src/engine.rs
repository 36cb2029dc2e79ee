//! Predictive engine — owns one fitted model and forecasts from it.
//!
//! The engine is shared between evaluation passes, so the current model
//! sits behind a lock and is swapped wholesale on every successful
//! `train()`. Readers clone the `Arc` and never hold the lock while
//! forecasting.

use std::iter::FusedIterator;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use stackscale_core::{
    Component, MetricDataPoint, ModelKind, ScalingDecision, StrategyKind, format_duration,
};

use crate::error::{PredictError, PredictResult};
use crate::model::{FORECAST_STEP, PredictiveModel};

/// Load units one replica is assumed to absorb.
pub const CAPACITY_PER_REPLICA: f64 = 100.0;

/// Upper bound of a predictive recommendation before policy bounds apply.
pub const MAX_REPLICAS: u32 = 10;

const DEFAULT_HORIZON: Duration = Duration::from_secs(3600);

/// Replicas needed to absorb `load`, in `[1, MAX_REPLICAS]`.
pub fn replicas_for_load(load: f64) -> u32 {
    let raw = (load / CAPACITY_PER_REPLICA).ceil();
    if !raw.is_finite() || raw < 1.0 {
        1
    } else {
        raw.min(MAX_REPLICAS as f64) as u32
    }
}

pub struct PredictiveEngine {
    kind: ModelKind,
    horizon: Duration,
    model: RwLock<Option<Arc<PredictiveModel>>>,
}

impl PredictiveEngine {
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            horizon: DEFAULT_HORIZON,
            model: RwLock::new(None),
        }
    }

    /// Engine for a model named in configuration; unknown names are linear.
    pub fn from_name(name: &str) -> Self {
        let kind = ModelKind::from_name(name);
        if kind.as_str() != name.trim().to_ascii_lowercase() {
            warn!(model = %name, resolved = %kind, "unrecognized model name");
        }
        Self::new(kind)
    }

    /// Forecast horizon recorded on trained models.
    pub fn with_horizon(mut self, horizon: Duration) -> Self {
        self.horizon = horizon;
        self
    }

    /// The model family this engine trains.
    pub fn model_kind(&self) -> ModelKind {
        self.kind
    }

    /// The current model, if one has been trained.
    pub fn model(&self) -> Option<Arc<PredictiveModel>> {
        self.model.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Accuracy of the current model.
    pub fn accuracy(&self) -> Option<f64> {
        self.model().map(|m| m.accuracy)
    }

    /// Fit a new model and replace the current one.
    ///
    /// On error the previous model, if any, stays in place.
    pub fn train(&self, series: &[MetricDataPoint]) -> PredictResult<Arc<PredictiveModel>> {
        let model = Arc::new(PredictiveModel::fit(
            self.kind,
            series,
            self.horizon,
            Utc::now(),
        )?);
        debug!(
            requested = %self.kind,
            fitted = %model.kind,
            points = model.training.len(),
            accuracy = model.accuracy,
            "model replaced"
        );
        *self.model.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Forecast `horizon` past the last training sample at 5-minute steps.
    pub fn predict(&self, horizon: Duration) -> PredictResult<Forecast> {
        let model = self.model().ok_or(PredictError::NotTrained)?;
        Ok(Forecast::new(model, horizon))
    }

    /// Highest forecast value within `horizon`.
    pub fn forecast_peak(&self, horizon: Duration) -> PredictResult<f64> {
        self.predict(horizon)?
            .map(|p| p.value)
            .reduce(f64::max)
            .ok_or(PredictError::EmptyForecast { horizon })
    }

    /// Turn the forecast peak into a predictive scaling decision.
    pub fn make_prediction(
        &self,
        component: Component,
        current_replicas: u32,
        horizon: Duration,
    ) -> PredictResult<ScalingDecision> {
        let peak = self.forecast_peak(horizon)?;
        Ok(self.decision_for_peak(component, current_replicas, horizon, peak))
    }

    /// Build the decision for an already computed forecast peak.
    pub fn decision_for_peak(
        &self,
        component: Component,
        current_replicas: u32,
        horizon: Duration,
        peak: f64,
    ) -> ScalingDecision {
        let target_replicas = replicas_for_load(peak);

        debug!(
            component = %component,
            peak,
            current_replicas,
            target_replicas,
            "prediction made"
        );

        ScalingDecision {
            strategy: StrategyKind::Predictive,
            component,
            current_replicas,
            target_replicas,
            current_shape: None,
            target_shape: None,
            reason: format!(
                "predicted load of {peak:.2} units in next {}",
                format_duration(horizon)
            ),
            cost_impact: None,
            timestamp: Utc::now(),
        }
    }
}

// ── Forecast ───────────────────────────────────────────────────────

/// Lazily computed forecast points. Finite and single-pass.
pub struct Forecast {
    model: Arc<PredictiveModel>,
    start: DateTime<Utc>,
    next_step: u64,
    steps: u64,
}

impl Forecast {
    fn new(model: Arc<PredictiveModel>, horizon: Duration) -> Self {
        let start = model.last_timestamp();
        Self {
            model,
            start,
            next_step: 1,
            steps: horizon.as_secs() / FORECAST_STEP.as_secs(),
        }
    }

    /// Model the points are computed from.
    pub fn model(&self) -> &PredictiveModel {
        &self.model
    }
}

impl Iterator for Forecast {
    type Item = MetricDataPoint;

    fn next(&mut self) -> Option<MetricDataPoint> {
        if self.next_step > self.steps {
            return None;
        }
        let offset = TimeDelta::seconds((FORECAST_STEP.as_secs() * self.next_step) as i64);
        self.next_step += 1;

        let timestamp = self.start + offset;
        let value = self.model.value_at(timestamp).max(0.0);
        Some(
            MetricDataPoint::new(timestamp, value)
                .with_label("type", "prediction")
                .with_label("model", self.model.kind.as_str()),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.steps + 1).saturating_sub(self.next_step) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Forecast {}

impl FusedIterator for Forecast {}
