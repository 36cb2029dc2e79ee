//! stackscale-cost — price configurations and search within a budget.
//!
//! ```text
//! monthly = (cores · cpu_rate + GiB · mem_rate) · replicas · 730h
//!         + storage_gb(component) · replicas · storage_rate
//! ```
//!
//! `find_optimal` walks replicas 1..=10 × the component's shape catalog and
//! keeps the in-budget configuration with the best performance per dollar.

pub mod error;
pub mod model;
pub mod pricing;
pub mod trend;

pub use error::{CostError, CostResult};
pub use model::{CostModel, HOURS_PER_MONTH, MAX_SEARCH_REPLICAS, performance_score};
pub use pricing::{ProviderRates, shape_catalog, storage_gb_per_replica};
pub use trend::{CostAnalysis, CostDataPoint, CostTrend};
