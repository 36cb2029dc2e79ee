//! Built-in provider rate tables and per-component resource catalogs.

use serde::{Deserialize, Serialize};

use stackscale_core::{CloudProvider, Component, GIB, MIB, ResourceShape};

/// Unit prices in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProviderRates {
    pub cpu_per_core_hour: f64,
    pub memory_per_gib_hour: f64,
    pub storage_per_gb_month: f64,
}

impl ProviderRates {
    pub fn for_provider(provider: CloudProvider) -> Self {
        match provider {
            CloudProvider::Aws => Self {
                cpu_per_core_hour: 0.0464,
                memory_per_gib_hour: 0.0058,
                storage_per_gb_month: 0.10,
            },
            CloudProvider::Gcp => Self {
                cpu_per_core_hour: 0.0475,
                memory_per_gib_hour: 0.0050,
                storage_per_gb_month: 0.17,
            },
            CloudProvider::Azure => Self {
                cpu_per_core_hour: 0.0496,
                memory_per_gib_hour: 0.0055,
                storage_per_gb_month: 0.15,
            },
            CloudProvider::OnPrem => Self {
                cpu_per_core_hour: 0.03,
                memory_per_gib_hour: 0.004,
                storage_per_gb_month: 0.05,
            },
        }
    }
}

/// Persistent volume size each replica is assumed to carry.
pub fn storage_gb_per_replica(component: Component) -> f64 {
    match component {
        Component::MetricsCollector => 100.0,
        Component::LogStore => 200.0,
        Component::TraceStore => 50.0,
        Component::DashboardService => 10.0,
    }
}

/// Candidate shapes for the budget search, smallest first.
pub fn shape_catalog(component: Component) -> Vec<ResourceShape> {
    match component {
        Component::MetricsCollector => vec![
            ResourceShape::new("small", 250, GIB, 500, 2 * GIB),
            ResourceShape::new("medium", 500, 2 * GIB, 1000, 4 * GIB),
            ResourceShape::new("large", 1000, 4 * GIB, 2000, 8 * GIB),
        ],
        Component::DashboardService => vec![
            ResourceShape::new("small", 100, 256 * MIB, 250, 512 * MIB),
            ResourceShape::new("medium", 250, 512 * MIB, 500, GIB),
        ],
        Component::LogStore | Component::TraceStore => {
            vec![ResourceShape::new("default", 100, 256 * MIB, 500, GIB)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogs_are_ordered_by_size() {
        for component in Component::ALL {
            let shapes = shape_catalog(component);
            assert!(!shapes.is_empty());
            assert!(
                shapes
                    .windows(2)
                    .all(|w| w[0].cpu_request_millis < w[1].cpu_request_millis)
            );
        }
        assert_eq!(shape_catalog(Component::MetricsCollector)[2].name, "large");
    }

    #[test]
    fn on_prem_is_cheapest() {
        let on_prem = ProviderRates::for_provider(CloudProvider::OnPrem);
        for provider in [CloudProvider::Aws, CloudProvider::Gcp, CloudProvider::Azure] {
            let rates = ProviderRates::for_provider(provider);
            assert!(rates.cpu_per_core_hour > on_prem.cpu_per_core_hour);
            assert!(rates.storage_per_gb_month > on_prem.storage_per_gb_month);
        }
    }
}
