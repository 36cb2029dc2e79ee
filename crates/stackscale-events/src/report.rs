//! Aggregate scaling reports, computed fresh from the event history.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stackscale_core::{Component, ScalingEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentReport {
    pub component: Component,
    pub total_events: usize,
    pub successful_events: usize,
    pub failed_events: usize,
    /// Percentage of successful events, 0–100.
    pub success_rate: f64,
    #[serde(with = "stackscale_core::duration::serde_str")]
    pub average_duration: Duration,
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// Sum of positive monthly savings.
    pub total_cost_savings: f64,
    /// Ties go to the reason seen first.
    pub most_common_reason: Option<String>,
    /// Event count per strategy kind name.
    pub events_by_strategy: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingReport {
    pub generated_at: DateTime<Utc>,
    #[serde(with = "stackscale_core::duration::serde_str")]
    pub window: Duration,
    pub total_events: usize,
    pub overall_success_rate: f64,
    pub total_cost_savings: f64,
    pub components: BTreeMap<Component, ComponentReport>,
}

impl ScalingReport {
    pub fn component(&self, component: Component) -> Option<&ComponentReport> {
        self.components.get(&component)
    }
}

/// Aggregate `events` per component. Events are taken in chronological order.
pub fn build_report(
    events: &[ScalingEvent],
    window: Duration,
    generated_at: DateTime<Utc>,
) -> ScalingReport {
    let mut ordered: Vec<&ScalingEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.timestamp);

    let mut grouped: BTreeMap<Component, Vec<&ScalingEvent>> = BTreeMap::new();
    for event in ordered {
        grouped.entry(event.component).or_default().push(event);
    }

    let components: BTreeMap<Component, ComponentReport> = grouped
        .into_iter()
        .map(|(component, events)| (component, component_report(component, &events)))
        .collect();

    let total_events: usize = components.values().map(|r| r.total_events).sum();
    let successful: usize = components.values().map(|r| r.successful_events).sum();
    let total_cost_savings = components.values().map(|r| r.total_cost_savings).sum();

    ScalingReport {
        generated_at,
        window,
        total_events,
        overall_success_rate: percentage(successful, total_events),
        total_cost_savings,
        components,
    }
}

fn component_report(component: Component, events: &[&ScalingEvent]) -> ComponentReport {
    let total_events = events.len();
    let successful_events = events.iter().filter(|e| e.success).count();

    let total_duration: Duration = events.iter().map(|e| e.duration).sum();
    let average_duration = total_duration
        .checked_div(total_events as u32)
        .unwrap_or(Duration::ZERO);

    let min_replicas = events.iter().map(|e| e.to_replicas).min().unwrap_or(0);
    let max_replicas = events.iter().map(|e| e.to_replicas).max().unwrap_or(0);

    let total_cost_savings = events
        .iter()
        .filter_map(|e| e.cost_impact.as_ref())
        .map(|c| c.monthly_savings)
        .filter(|s| *s > 0.0)
        .sum();

    let mut events_by_strategy = BTreeMap::new();
    for event in events {
        *events_by_strategy
            .entry(event.strategy.as_str().to_string())
            .or_insert(0) += 1;
    }

    ComponentReport {
        component,
        total_events,
        successful_events,
        failed_events: total_events - successful_events,
        success_rate: percentage(successful_events, total_events),
        average_duration,
        min_replicas,
        max_replicas,
        total_cost_savings,
        most_common_reason: most_common_reason(events),
        events_by_strategy,
    }
}

fn most_common_reason(events: &[&ScalingEvent]) -> Option<String> {
    // (reason, count) in first-seen order.
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for event in events {
        match counts.iter_mut().find(|(r, _)| *r == event.reason) {
            Some((_, n)) => *n += 1,
            None => counts.push((event.reason.as_str(), 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (reason, count) in counts {
        if best.is_none_or(|(_, n)| count > n) {
            best = Some((reason, count));
        }
    }
    best.map(|(r, _)| r.to_string())
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
