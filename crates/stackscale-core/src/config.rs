//! Autoscaling configuration (TOML).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{CloudProvider, Component, ModelKind, ScalingPolicy, WorkloadDrainConfig};

/// Top-level autoscaling configuration. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscalingConfig {
    pub enabled: bool,
    pub predictive_enabled: bool,
    pub cost_aware_enabled: bool,
    pub policies: HashMap<Component, ScalingPolicy>,
    pub drain: WorkloadDrainConfig,
    #[serde(with = "crate::duration::serde_str")]
    pub event_retention: Duration,
    #[serde(with = "crate::duration::serde_str")]
    pub evaluation_interval: Duration,
    /// How much history to train forecasting models on.
    #[serde(with = "crate::duration::serde_str")]
    pub history_window: Duration,
    #[serde(with = "crate::duration::serde_str")]
    pub prediction_horizon: Duration,
    pub cost_provider: CloudProvider,
    pub region: String,
    pub model_kind: ModelKind,
    /// Monthly budget used when a cost-aware policy sets no threshold.
    pub default_budget: f64,
    pub event_store: EventStoreConfig,
}

impl Default for AutoscalingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            predictive_enabled: true,
            cost_aware_enabled: true,
            policies: HashMap::new(),
            drain: WorkloadDrainConfig::default(),
            event_retention: Duration::from_secs(7 * 86_400),
            evaluation_interval: Duration::from_secs(30),
            history_window: Duration::from_secs(7 * 86_400),
            prediction_horizon: Duration::from_secs(3600),
            cost_provider: CloudProvider::Aws,
            region: "us-east-1".to_string(),
            model_kind: ModelKind::Linear,
            default_budget: 1000.0,
            event_store: EventStoreConfig::default(),
        }
    }
}

/// Which event store backend to build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventStoreConfig {
    /// Bounded in-memory ring; oldest events are dropped beyond `capacity`.
    Memory { capacity: usize },
    /// redb database file, one record per event.
    Durable { path: PathBuf },
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        EventStoreConfig::Memory { capacity: 10_000 }
    }
}

impl AutoscalingConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: AutoscalingConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn policy(&self, component: Component) -> Option<&ScalingPolicy> {
        self.policies.get(&component)
    }
}
