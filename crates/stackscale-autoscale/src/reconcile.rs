//! Periodic reconciliation across all components.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use stackscale_core::{Component, ScalingEvent};

use crate::coordinator::ScalingCoordinator;
use crate::error::ScaleResult;

/// What one reconciliation pass did.
#[derive(Debug, Default)]
pub struct ReconcileSummary {
    /// Components with a policy that were evaluated.
    pub evaluated: usize,
    /// Events recorded for executed decisions, ordered by component.
    pub events: Vec<ScalingEvent>,
    pub errors: Vec<(Component, String)>,
    /// Events removed by retention cleanup.
    pub expired: usize,
}

impl ScalingCoordinator {
    /// Evaluate every component with a policy and execute the resulting
    /// decisions concurrently, then apply event retention.
    pub async fn reconcile(self: &Arc<Self>) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        if !self.config().enabled {
            debug!("autoscaling disabled, skipping reconciliation");
            return summary;
        }

        let mut tasks = JoinSet::new();
        for component in Component::ALL {
            if self.config().policy(component).is_none() {
                continue;
            }
            let coordinator = Arc::clone(self);
            tasks.spawn(async move {
                let result = coordinator.reconcile_component(component).await;
                (component, result)
            });
            summary.evaluated += 1;
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Some(event)))) => summary.events.push(event),
                Ok((_, Ok(None))) => {}
                Ok((component, Err(e))) => {
                    warn!(component = %component, error = %e, "component reconciliation failed");
                    summary.errors.push((component, e.to_string()));
                }
                Err(e) => error!(error = %e, "reconciliation task failed"),
            }
        }
        summary.events.sort_by_key(|e| e.component);

        match self.cleanup() {
            Ok(expired) => summary.expired = expired,
            Err(e) => warn!(error = %e, "event retention cleanup failed"),
        }

        info!(
            evaluated = summary.evaluated,
            executed = summary.events.len(),
            errors = summary.errors.len(),
            expired = summary.expired,
            "reconciliation pass complete"
        );
        summary
    }

    async fn reconcile_component(&self, component: Component) -> ScaleResult<Option<ScalingEvent>> {
        let Some(decision) = self.evaluate(component).await? else {
            return Ok(None);
        };
        if !decision.changes_anything() {
            debug!(component = %component, replicas = decision.target_replicas, "already at target");
            return Ok(None);
        }
        self.execute(&decision).await.map(Some)
    }

    /// Reconcile every `evaluation_interval` until `shutdown` changes.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let interval = self.config().evaluation_interval;
        info!(interval_secs = interval.as_secs(), "scaling coordinator started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.reconcile().await;
                }
                _ = shutdown.changed() => {
                    info!("scaling coordinator shutting down");
                    break;
                }
            }
        }
    }
}
