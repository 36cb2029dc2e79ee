//! Cost trend analysis over recorded scaling events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use stackscale_core::{Component, ScalingEvent};

use crate::error::{CostError, CostResult};

/// First-vs-last change, in percent, beyond which a trend is reported.
const TREND_THRESHOLD_PERCENT: f64 = 10.0;

/// Average monthly cost above which cost-reduction advice is added.
const HIGH_COST_THRESHOLD: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTrend {
    Increasing,
    Decreasing,
    Stable,
}

impl fmt::Display for CostTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CostTrend::Increasing => "increasing",
            CostTrend::Decreasing => "decreasing",
            CostTrend::Stable => "stable",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostDataPoint {
    pub timestamp: DateTime<Utc>,
    pub cost: f64,
    pub replicas: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostAnalysis {
    pub component: Component,
    pub average_cost: f64,
    pub min_cost: f64,
    pub max_cost: f64,
    pub trend: CostTrend,
    /// Chronological projected cost of every event that carried one.
    pub cost_over_time: Vec<CostDataPoint>,
    pub recommendations: Vec<String>,
}

pub(crate) fn analyze(component: Component, history: &[ScalingEvent]) -> CostResult<CostAnalysis> {
    if history.is_empty() {
        return Err(CostError::EmptyHistory { component });
    }

    let mut cost_over_time: Vec<CostDataPoint> = history
        .iter()
        .filter_map(|event| {
            event.cost_impact.as_ref().map(|impact| CostDataPoint {
                timestamp: event.timestamp,
                cost: impact.projected_cost,
                replicas: event.to_replicas,
            })
        })
        .collect();
    cost_over_time.sort_by_key(|p| p.timestamp);

    let (average_cost, min_cost, max_cost) = if cost_over_time.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let costs = cost_over_time.iter().map(|p| p.cost);
        let total: f64 = costs.clone().sum();
        (
            total / cost_over_time.len() as f64,
            costs.clone().fold(f64::INFINITY, f64::min),
            costs.fold(f64::NEG_INFINITY, f64::max),
        )
    };

    let trend = classify(&cost_over_time);
    let recommendations = recommendations(component, average_cost, trend);

    debug!(
        component = %component,
        events = history.len(),
        priced = cost_over_time.len(),
        average_cost,
        trend = %trend,
        "cost trend analyzed"
    );

    Ok(CostAnalysis {
        component,
        average_cost,
        min_cost,
        max_cost,
        trend,
        cost_over_time,
        recommendations,
    })
}

fn classify(points: &[CostDataPoint]) -> CostTrend {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return CostTrend::Stable;
    };
    if points.len() < 2 {
        return CostTrend::Stable;
    }

    if first.cost == 0.0 {
        return if last.cost > 0.0 {
            CostTrend::Increasing
        } else {
            CostTrend::Stable
        };
    }

    let change = (last.cost - first.cost) / first.cost * 100.0;
    if change > TREND_THRESHOLD_PERCENT {
        CostTrend::Increasing
    } else if change < -TREND_THRESHOLD_PERCENT {
        CostTrend::Decreasing
    } else {
        CostTrend::Stable
    }
}

fn recommendations(component: Component, average_cost: f64, trend: CostTrend) -> Vec<String> {
    let mut advice: Vec<&str> = Vec::new();

    if trend == CostTrend::Increasing {
        advice.extend([
            "Tighten autoscaling policies so replicas are released sooner",
            "Check resource requests and limits for over-provisioning",
            "Enable predictive scaling to get ahead of recurring load",
        ]);
    }

    if average_cost > HIGH_COST_THRESHOLD {
        advice.extend([
            "Run non-critical replicas on spot or preemptible capacity",
            "Scale down on a schedule during known quiet periods",
            "Shorten storage retention to cut volume costs",
        ]);
    }

    match component {
        Component::MetricsCollector => advice.extend([
            "Downsample old metrics to reduce storage",
            "Precompute expensive queries with recording rules",
        ]),
        Component::LogStore => advice.extend([
            "Apply log retention limits per stream",
            "Sample high-volume, low-value log streams",
        ]),
        Component::DashboardService | Component::TraceStore => {}
    }

    advice.into_iter().map(str::to_string).collect()
}
