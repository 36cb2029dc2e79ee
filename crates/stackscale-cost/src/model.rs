//! Cost model — prices configurations and searches for the best one in budget.

use std::ops::RangeInclusive;

use chrono::Utc;
use tracing::{debug, info};

use stackscale_core::{
    CloudProvider, Component, CostImpact, ResourceShape, ScalingDecision, ScalingEvent,
    StrategyKind,
};

use crate::error::{CostError, CostResult};
use crate::pricing::{ProviderRates, shape_catalog, storage_gb_per_replica};
use crate::trend::{self, CostAnalysis};

pub const HOURS_PER_MONTH: f64 = 730.0;

/// Largest replica count the budget search considers.
pub const MAX_SEARCH_REPLICAS: u32 = 10;

const CPU_WEIGHT: f64 = 0.6;
const MEMORY_WEIGHT: f64 = 0.4;
/// Efficiency lost per replica beyond the first.
const EFFICIENCY_DECAY: f64 = 0.05;
const MIN_EFFICIENCY: f64 = 0.5;

/// Relative throughput of a configuration, with diminishing returns per replica.
pub fn performance_score(replicas: u32, shape: &ResourceShape) -> f64 {
    let per_replica = shape.cpu_cores() * CPU_WEIGHT + shape.memory_gib() * MEMORY_WEIGHT;
    let efficiency =
        (1.0 - EFFICIENCY_DECAY * replicas.saturating_sub(1) as f64).max(MIN_EFFICIENCY);
    per_replica * replicas as f64 * efficiency
}

#[derive(Debug, Clone)]
pub struct CostModel {
    provider: CloudProvider,
    region: String,
    rates: ProviderRates,
}

impl CostModel {
    pub fn new(provider: CloudProvider, region: &str) -> Self {
        Self {
            provider,
            region: region.to_string(),
            rates: ProviderRates::for_provider(provider),
        }
    }

    pub fn provider(&self) -> CloudProvider {
        self.provider
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn rates(&self) -> ProviderRates {
        self.rates
    }

    /// Monthly cost in USD of running `replicas` copies of `shape`.
    pub fn price(&self, component: Component, replicas: u32, shape: &ResourceShape) -> f64 {
        let replicas = replicas as f64;
        let compute_per_hour = shape.cpu_cores() * self.rates.cpu_per_core_hour
            + shape.memory_gib() * self.rates.memory_per_gib_hour;
        let storage = storage_gb_per_replica(component) * replicas * self.rates.storage_per_gb_month;
        compute_per_hour * replicas * HOURS_PER_MONTH + storage
    }

    /// Cost of moving from `current_replicas` to `target_replicas` at one shape.
    pub fn impact(
        &self,
        component: Component,
        current_replicas: u32,
        target_replicas: u32,
        shape: &ResourceShape,
    ) -> CostImpact {
        CostImpact::new(
            self.price(component, current_replicas, shape),
            self.price(component, target_replicas, shape),
        )
    }

    /// Best performance-per-dollar configuration within `budget`, searching
    /// 1..=10 replicas and the component's shape catalog.
    pub fn find_optimal(
        &self,
        component: Component,
        current_replicas: u32,
        budget: f64,
    ) -> CostResult<ScalingDecision> {
        self.find_optimal_in(
            component,
            current_replicas,
            None,
            budget,
            1..=MAX_SEARCH_REPLICAS,
        )
    }

    /// Like `find_optimal`, restricted to `replicas ∩ 1..=10`.
    ///
    /// `current_shape` prices the current configuration; without one the
    /// smallest catalog shape is assumed.
    pub fn find_optimal_in(
        &self,
        component: Component,
        current_replicas: u32,
        current_shape: Option<&ResourceShape>,
        budget: f64,
        replicas: RangeInclusive<u32>,
    ) -> CostResult<ScalingDecision> {
        let catalog = shape_catalog(component);
        let low = (*replicas.start()).max(1);
        let high = (*replicas.end()).min(MAX_SEARCH_REPLICAS);

        let mut best: Option<(u32, &ResourceShape, f64)> = None;
        let mut best_ratio = 0.0;

        for count in low..=high {
            for shape in &catalog {
                let cost = self.price(component, count, shape);
                if cost > budget || cost <= 0.0 {
                    continue;
                }
                let ratio = performance_score(count, shape) / cost;
                if ratio > best_ratio {
                    best_ratio = ratio;
                    best = Some((count, shape, cost));
                }
            }
        }

        let Some((target_replicas, target_shape, projected_cost)) = best else {
            debug!(component = %component, budget, low, high, "no configuration within budget");
            return Err(CostError::NoFeasibleConfiguration { component, budget });
        };

        let current_shape = current_shape
            .cloned()
            .or_else(|| catalog.first().cloned());
        let current_cost = current_shape
            .as_ref()
            .map(|s| self.price(component, current_replicas, s))
            .unwrap_or(0.0);
        let cost_impact = CostImpact::new(current_cost, projected_cost);

        info!(
            component = %component,
            provider = %self.provider,
            target_replicas,
            shape = %target_shape.name,
            monthly_cost = projected_cost,
            savings = cost_impact.monthly_savings,
            "found optimal configuration"
        );

        Ok(ScalingDecision {
            strategy: StrategyKind::CostAware,
            component,
            current_replicas,
            target_replicas,
            current_shape,
            target_shape: Some(target_shape.clone()),
            reason: format!("optimal configuration within budget ${budget:.2}"),
            cost_impact: Some(cost_impact),
            timestamp: Utc::now(),
        })
    }

    /// Summarize the cost recorded on past scaling events.
    pub fn analyze_trend(
        &self,
        component: Component,
        history: &[ScalingEvent],
    ) -> CostResult<CostAnalysis> {
        trend::analyze(component, history)
    }
}
