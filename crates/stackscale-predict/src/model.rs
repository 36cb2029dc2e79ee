//! Fitted forecasting models.
//!
//! A `PredictiveModel` is built in one shot from a training series and is
//! never mutated afterwards; retraining produces a new model.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use stackscale_core::{MetricDataPoint, ModelKind};

use crate::error::{PredictError, PredictResult};

/// Fewer samples than this cannot be trained on.
pub const MIN_TRAINING_POINTS: usize = 10;

/// Spacing between forecast points.
pub const FORECAST_STEP: Duration = Duration::from_secs(5 * 60);

/// Seasonality detection needs two days of hourly samples.
const MIN_SEASONAL_POINTS: usize = 48;
const DAILY_PERIOD_HOURS: usize = 24;
const WEEKLY_PERIOD_HOURS: usize = 168;
const SEASONALITY_THRESHOLD: f64 = 0.7;

/// Seasonal models report a fixed accuracy; there is no holdout evaluation.
const SEASONAL_ACCURACY: f64 = 0.85;

/// Learned parameters, one variant per model family.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelFit {
    /// `value = slope · seconds_since_origin + intercept`.
    Linear { slope: f64, intercept: f64 },
    /// `value = level + trend_per_hour · hours_after_last_sample`.
    Exponential {
        alpha: f64,
        level: f64,
        trend_per_hour: f64,
    },
    /// Linear trend scaled by the index of the point's position in the period.
    Seasonal {
        slope: f64,
        intercept: f64,
        period_hours: usize,
        indices: Vec<f64>,
    },
}

#[derive(Debug, Clone)]
pub struct PredictiveModel {
    /// Family of the fitted model. A seasonal request with no detectable
    /// period yields a linear model.
    pub kind: ModelKind,
    /// Goodness of fit in `[0, 1]`.
    pub accuracy: f64,
    pub trained_at: DateTime<Utc>,
    pub horizon: Duration,
    /// Training samples sorted by timestamp.
    pub training: Vec<MetricDataPoint>,
    pub fit: ModelFit,
}

impl PredictiveModel {
    /// Fit a model of the requested family.
    pub fn fit(
        kind: ModelKind,
        series: &[MetricDataPoint],
        horizon: Duration,
        trained_at: DateTime<Utc>,
    ) -> PredictResult<Self> {
        if series.len() < MIN_TRAINING_POINTS {
            return Err(PredictError::InsufficientData {
                needed: MIN_TRAINING_POINTS,
                got: series.len(),
            });
        }

        let mut training = series.to_vec();
        training.sort_by_key(|p| p.timestamp);

        let (kind, accuracy, fit) = match kind {
            ModelKind::Linear => fit_linear(&training),
            ModelKind::Exponential => fit_exponential(&training),
            ModelKind::Seasonal => fit_seasonal(&training),
        };

        Ok(Self {
            kind,
            accuracy,
            trained_at,
            horizon,
            training,
            fit,
        })
    }

    /// Timestamp of the first training sample.
    pub fn origin(&self) -> DateTime<Utc> {
        self.training[0].timestamp
    }

    /// Timestamp of the last training sample.
    pub fn last_timestamp(&self) -> DateTime<Utc> {
        self.training[self.training.len() - 1].timestamp
    }

    pub fn last_value(&self) -> f64 {
        self.training[self.training.len() - 1].value
    }

    /// Raw model output at `at`, before any clamping.
    pub fn value_at(&self, at: DateTime<Utc>) -> f64 {
        match &self.fit {
            ModelFit::Linear { slope, intercept } => {
                slope * seconds_between(self.origin(), at) + intercept
            }
            ModelFit::Exponential {
                level,
                trend_per_hour,
                ..
            } => level + trend_per_hour * seconds_between(self.last_timestamp(), at) / 3600.0,
            ModelFit::Seasonal {
                slope,
                intercept,
                period_hours,
                indices,
            } => {
                let elapsed = seconds_between(self.origin(), at);
                let index = indices
                    .get(season_position(elapsed, *period_hours))
                    .copied()
                    .unwrap_or(1.0);
                (slope * elapsed + intercept) * index
            }
        }
    }
}

// ── Linear ─────────────────────────────────────────────────────────

fn fit_linear(training: &[MetricDataPoint]) -> (ModelKind, f64, ModelFit) {
    let origin = training[0].timestamp;
    let xs: Vec<f64> = training
        .iter()
        .map(|p| seconds_between(origin, p.timestamp))
        .collect();
    let ys: Vec<f64> = training.iter().map(|p| p.value).collect();

    let (slope, intercept, r_squared) = least_squares(&xs, &ys);
    info!(slope, intercept, accuracy = r_squared, "linear model trained");
    (
        ModelKind::Linear,
        r_squared,
        ModelFit::Linear { slope, intercept },
    )
}

/// Ordinary least squares; returns (slope, intercept, R² clamped to [0, 1]).
fn least_squares(xs: &[f64], ys: &[f64]) -> (f64, f64, f64) {
    let n = xs.len() as f64;
    let sum_x: f64 = xs.iter().sum();
    let sum_y: f64 = ys.iter().sum();
    let sum_xy: f64 = xs.iter().zip(ys).map(|(x, y)| x * y).sum();
    let sum_xx: f64 = xs.iter().map(|x| x * x).sum();
    let mean_y = sum_y / n;

    let denominator = n * sum_xx - sum_x * sum_x;
    let (slope, intercept) = if denominator.abs() < f64::EPSILON {
        // All samples share one timestamp.
        (0.0, mean_y)
    } else {
        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        (slope, (sum_y - slope * sum_x) / n)
    };

    let mut ss_total = 0.0;
    let mut ss_residual = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let predicted = slope * x + intercept;
        ss_total += (y - mean_y).powi(2);
        ss_residual += (y - predicted).powi(2);
    }

    let r_squared = if ss_total == 0.0 {
        if ss_residual <= f64::EPSILON { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_residual / ss_total
    };
    let r_squared = if r_squared.is_finite() {
        r_squared.clamp(0.0, 1.0)
    } else {
        0.0
    };

    (slope, intercept, r_squared)
}

// ── Exponential smoothing ──────────────────────────────────────────

fn fit_exponential(training: &[MetricDataPoint]) -> (ModelKind, f64, ModelFit) {
    let values: Vec<f64> = training.iter().map(|p| p.value).collect();
    let alpha = optimize_alpha(&values);

    let mut smoothed = Vec::with_capacity(values.len());
    smoothed.push(values[0]);
    for (i, value) in values.iter().enumerate().skip(1) {
        smoothed.push(alpha * value + (1.0 - alpha) * smoothed[i - 1]);
    }

    // One-step-ahead MAPE; zero actuals contribute nothing.
    let mut mape = 0.0;
    for i in 1..values.len() {
        if values[i] != 0.0 {
            mape += ((values[i] - smoothed[i - 1]) / values[i]).abs() * 100.0;
        }
    }
    mape /= (values.len() - 1) as f64;
    let accuracy = (1.0 - mape / 100.0).clamp(0.0, 1.0);

    let level = smoothed[smoothed.len() - 1];
    let trend_per_hour = trend_per_hour(training);

    info!(alpha, level, trend_per_hour, accuracy, "exponential smoothing model trained");
    (
        ModelKind::Exponential,
        accuracy,
        ModelFit::Exponential {
            alpha,
            level,
            trend_per_hour,
        },
    )
}

/// Grid search α over 0.1..=0.9 minimizing cumulative one-step absolute error.
fn optimize_alpha(values: &[f64]) -> f64 {
    let mut best_alpha = 0.3;
    let mut best_error = f64::MAX;

    for step in 1..=9 {
        let alpha = step as f64 / 10.0;
        let mut total_error = 0.0;
        let mut level = values[0];
        for actual in &values[1..] {
            total_error += (actual - level).abs();
            level = alpha * actual + (1.0 - alpha) * level;
        }
        if total_error < best_error {
            best_error = total_error;
            best_alpha = alpha;
        }
    }

    best_alpha
}

/// (last − first) per elapsed hour; zero when no time elapsed.
fn trend_per_hour(training: &[MetricDataPoint]) -> f64 {
    let first = &training[0];
    let last = &training[training.len() - 1];
    let hours = seconds_between(first.timestamp, last.timestamp) / 3600.0;
    if hours == 0.0 {
        return 0.0;
    }
    (last.value - first.value) / hours
}

// ── Seasonal ───────────────────────────────────────────────────────

fn fit_seasonal(training: &[MetricDataPoint]) -> (ModelKind, f64, ModelFit) {
    let values: Vec<f64> = training.iter().map(|p| p.value).collect();
    let Some(period_hours) = detect_period(&values) else {
        info!("no seasonality detected, falling back to linear model");
        return fit_linear(training);
    };

    let origin = training[0].timestamp;
    let indices = seasonal_indices(training, origin, period_hours);

    let xs: Vec<f64> = training
        .iter()
        .map(|p| seconds_between(origin, p.timestamp))
        .collect();
    let (slope, intercept, _) = least_squares(&xs, &values);

    info!(period_hours, indices = indices.len(), "seasonal model trained");
    (
        ModelKind::Seasonal,
        SEASONAL_ACCURACY,
        ModelFit::Seasonal {
            slope,
            intercept,
            period_hours,
            indices,
        },
    )
}

fn detect_period(values: &[f64]) -> Option<usize> {
    if values.len() < MIN_SEASONAL_POINTS {
        return None;
    }
    let daily = autocorrelation(values, DAILY_PERIOD_HOURS);
    let weekly = autocorrelation(values, WEEKLY_PERIOD_HOURS);
    debug!(daily, weekly, "lag autocorrelation");

    if daily > SEASONALITY_THRESHOLD {
        Some(DAILY_PERIOD_HOURS)
    } else if weekly > SEASONALITY_THRESHOLD {
        Some(WEEKLY_PERIOD_HOURS)
    } else {
        None
    }
}

/// Sample autocorrelation at `lag`; zero when the series is shorter than two lags.
fn autocorrelation(values: &[f64], lag: usize) -> f64 {
    if values.len() < lag * 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;

    let numerator: f64 = (lag..values.len())
        .map(|i| (values[i] - mean) * (values[i - lag] - mean))
        .sum();
    let denominator: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();

    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Per-position averages normalized to mean 1. Empty positions get 1.0.
fn seasonal_indices(
    training: &[MetricDataPoint],
    origin: DateTime<Utc>,
    period_hours: usize,
) -> Vec<f64> {
    let mut sums = vec![0.0; period_hours];
    let mut counts = vec![0usize; period_hours];

    for point in training {
        let position = season_position(seconds_between(origin, point.timestamp), period_hours);
        sums[position] += point.value;
        counts[position] += 1;
    }

    let averages: Vec<Option<f64>> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &count)| (count > 0).then(|| sum / count as f64))
        .collect();
    let filled: Vec<f64> = averages.iter().flatten().copied().collect();
    let overall = filled.iter().sum::<f64>() / filled.len().max(1) as f64;

    averages
        .into_iter()
        .map(|avg| match avg {
            Some(avg) if overall != 0.0 => avg / overall,
            _ => 1.0,
        })
        .collect()
}

fn season_position(elapsed_secs: f64, period_hours: usize) -> usize {
    let hours = (elapsed_secs / 3600.0).floor().max(0.0) as usize;
    hours % period_hours.max(1)
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn hourly(values: impl IntoIterator<Item = f64>) -> Vec<MetricDataPoint> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| MetricDataPoint::new(base() + TimeDelta::hours(i as i64), v))
            .collect()
    }

    fn fit(kind: ModelKind, series: &[MetricDataPoint]) -> PredictiveModel {
        PredictiveModel::fit(kind, series, Duration::from_secs(3600), base()).unwrap()
    }

    #[test]
    fn rejects_short_series() {
        let series = hourly((0..9).map(|i| i as f64));
        let err = PredictiveModel::fit(ModelKind::Linear, &series, Duration::ZERO, base())
            .unwrap_err();
        assert_eq!(err, PredictError::InsufficientData { needed: 10, got: 9 });
    }

    #[test]
    fn linear_fit_of_exact_line_is_perfect() {
        let series = hourly((0..20).map(|i| 3.0 * i as f64 + 7.0));
        let model = fit(ModelKind::Linear, &series);
        assert_eq!(model.kind, ModelKind::Linear);
        assert!((model.accuracy - 1.0).abs() < 1e-9);
        let ModelFit::Linear { slope, intercept } = model.fit else {
            panic!("expected linear fit");
        };
        assert!((slope * 3600.0 - 3.0).abs() < 1e-6);
        assert!((intercept - 7.0).abs() < 1e-6);
    }

    #[test]
    fn constant_series_has_zero_slope() {
        let series = hourly(std::iter::repeat_n(42.0, 12));
        let model = fit(ModelKind::Linear, &series);
        assert_eq!(model.accuracy, 1.0);
        assert!((model.value_at(base() + TimeDelta::hours(100)) - 42.0).abs() < 1e-9);
    }

    #[test]
    fn training_is_sorted_by_timestamp() {
        let mut series = hourly((0..10).map(|i| i as f64));
        series.reverse();
        let model = fit(ModelKind::Linear, &series);
        assert_eq!(model.origin(), base());
        assert_eq!(model.last_value(), 9.0);
    }

    #[test]
    fn all_samples_at_one_instant() {
        let series: Vec<_> = (0..10)
            .map(|i| MetricDataPoint::new(base(), i as f64))
            .collect();
        let model = fit(ModelKind::Linear, &series);
        let ModelFit::Linear { slope, intercept } = model.fit else {
            panic!("expected linear fit");
        };
        assert_eq!(slope, 0.0);
        assert!((intercept - 4.5).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&model.accuracy));
    }

    #[test]
    fn exponential_accuracy_stays_in_range() {
        let noisy = hourly((0..40).map(|i| if i % 2 == 0 { 10.0 } else { 200.0 }));
        let model = fit(ModelKind::Exponential, &noisy);
        assert_eq!(model.kind, ModelKind::Exponential);
        assert!((0.0..=1.0).contains(&model.accuracy));

        let with_zeros = hourly((0..20).map(|i| if i % 3 == 0 { 0.0 } else { 50.0 }));
        let model = fit(ModelKind::Exponential, &with_zeros);
        assert!((0.0..=1.0).contains(&model.accuracy));
    }

    #[test]
    fn exponential_picks_largest_alpha_for_a_ramp() {
        // Tracking a steady ramp rewards reacting fast.
        let series = hourly((0..30).map(|i| 10.0 * i as f64));
        let model = fit(ModelKind::Exponential, &series);
        let ModelFit::Exponential {
            alpha,
            trend_per_hour,
            ..
        } = model.fit
        else {
            panic!("expected exponential fit");
        };
        assert!((alpha - 0.9).abs() < 1e-9);
        assert!((trend_per_hour - 10.0).abs() < 1e-9);
        // One hour past the last sample the trend has been added once.
        let next = model.value_at(model.last_timestamp() + TimeDelta::hours(1));
        let ModelFit::Exponential { level, .. } = model.fit else {
            unreachable!()
        };
        assert!((next - (level + 10.0)).abs() < 1e-9);
    }

    #[test]
    fn daily_pattern_is_detected() {
        let series = hourly((0..240).map(|i| {
            100.0 + 50.0 * (2.0 * std::f64::consts::PI * (i % 24) as f64 / 24.0).sin()
        }));
        let model = fit(ModelKind::Seasonal, &series);
        assert_eq!(model.kind, ModelKind::Seasonal);
        assert_eq!(model.accuracy, 0.85);

        let ModelFit::Seasonal {
            period_hours,
            ref indices,
            ..
        } = model.fit
        else {
            panic!("expected seasonal fit");
        };
        assert_eq!(period_hours, 24);
        assert_eq!(indices.len(), 24);
        let mean = indices.iter().sum::<f64>() / indices.len() as f64;
        assert!((mean - 1.0).abs() < 1e-9);
        assert!((indices[6] - 1.5).abs() < 1e-9);

        // Forecast follows the daily shape: 06:00 peaks above 18:00.
        let day_after = base() + TimeDelta::hours(240);
        let peak = model.value_at(day_after + TimeDelta::hours(6));
        let trough = model.value_at(day_after + TimeDelta::hours(18));
        assert!(peak > trough * 2.0);
    }

    #[test]
    fn seasonal_without_pattern_falls_back_to_linear() {
        let series = hourly((0..100).map(|i| 0.5 * i as f64 + 10.0));
        let model = fit(ModelKind::Seasonal, &series);
        assert_eq!(model.kind, ModelKind::Linear);
        assert!(matches!(model.fit, ModelFit::Linear { .. }));

        let short = hourly((0..30).map(|i| (i % 24) as f64));
        assert_eq!(fit(ModelKind::Seasonal, &short).kind, ModelKind::Linear);
    }

    #[test]
    fn autocorrelation_needs_two_lags() {
        let values: Vec<f64> = (0..47).map(|i| i as f64).collect();
        assert_eq!(autocorrelation(&values, 24), 0.0);
        assert_eq!(autocorrelation(&[5.0; 60], 24), 0.0);
    }
}
