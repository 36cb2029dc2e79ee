//! EventRecorder — the single entry point for persisting scaling outcomes.
//!
//! ```text
//! record(event)
//!   ├── ensure_id()
//!   ├── store.store()      ← only failure here is returned
//!   ├── notifier.try_send() best-effort, dropped when full
//!   ├── audit.write_audit() logged on failure
//!   └── metrics            events total, duration, replicas, savings
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use stackscale_core::metrics::names;
use stackscale_core::{Component, EventStoreConfig, MetricsSink, NoopMetrics, ScalingEvent};

use crate::durable::DurableEventStore;
use crate::error::EventResult;
use crate::report::{ScalingReport, build_report};
use crate::store::{EventStore, InMemoryAuditLog, InMemoryEventStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Normal,
    Warning,
}

/// What the notification channel receives for every recorded event.
#[derive(Debug, Clone)]
pub struct Notification {
    pub severity: Severity,
    /// Short machine-readable reason, e.g. `ScalingSucceeded`.
    pub reason: &'static str,
    pub message: String,
    pub event: ScalingEvent,
}

impl Notification {
    pub fn from_event(event: &ScalingEvent) -> Self {
        let (severity, reason) = if event.success {
            (Severity::Normal, "ScalingSucceeded")
        } else {
            (Severity::Warning, "ScalingFailed")
        };
        let mut message = format!(
            "{} scaled {} from {} to {} replicas: {}",
            event.strategy, event.component, event.from_replicas, event.to_replicas, event.reason
        );
        if let Some(err) = &event.error {
            message.push_str(&format!(" (error: {err})"));
        }
        Self {
            severity,
            reason,
            message,
            event: event.clone(),
        }
    }
}

/// Auxiliary record written next to every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_id: String,
    pub component: Component,
    pub action: String,
    pub success: bool,
    pub summary: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn from_event(event: &ScalingEvent) -> Self {
        Self {
            event_id: event.id.clone(),
            component: event.component,
            action: format!("{}-scale", event.strategy),
            success: event.success,
            summary: format!(
                "{} -> {} replicas: {}",
                event.from_replicas, event.to_replicas, event.reason
            ),
            recorded_at: Utc::now(),
        }
    }
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn write_audit(&self, record: &AuditRecord) -> EventResult<()>;
}

pub struct EventRecorder {
    store: Arc<dyn EventStore>,
    audit: Option<Arc<dyn AuditSink>>,
    notifier: Option<mpsc::Sender<Notification>>,
    metrics: Arc<dyn MetricsSink>,
}

impl EventRecorder {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            audit: None,
            notifier: None,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Build the store described by `config`. Audit records go to the
    /// durable store, or to an in-memory ring next to an in-memory store.
    pub fn open(config: &EventStoreConfig) -> EventResult<Self> {
        match config {
            EventStoreConfig::Memory { capacity } => {
                info!(capacity, "using in-memory event store");
                let store = Arc::new(InMemoryEventStore::new(*capacity));
                let audit = Arc::new(InMemoryAuditLog::new(*capacity));
                Ok(Self::new(store).with_audit(audit))
            }
            EventStoreConfig::Durable { path } => {
                let store = Arc::new(DurableEventStore::open(path)?);
                info!(?path, "using durable event store");
                Ok(Self::new(store.clone()).with_audit(store))
            }
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_notifier(mut self, notifier: mpsc::Sender<Notification>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Persist an event and fan it out. Returns the event with its id.
    pub fn record(&self, mut event: ScalingEvent) -> EventResult<ScalingEvent> {
        event.ensure_id();

        if let Err(e) = self.store.store(&event) {
            error!(id = %event.id, component = %event.component, error = %e, "failed to store scaling event");
            return Err(e);
        }

        self.notify(&event);

        if let Some(audit) = &self.audit
            && let Err(e) = audit.write_audit(&AuditRecord::from_event(&event))
        {
            warn!(id = %event.id, error = %e, "failed to write audit record");
        }

        self.publish_metrics(&event);

        info!(
            id = %event.id,
            component = %event.component,
            strategy = %event.strategy,
            from = event.from_replicas,
            to = event.to_replicas,
            success = event.success,
            "scaling event recorded"
        );
        Ok(event)
    }

    /// Events recorded within the trailing `window`.
    pub fn list(
        &self,
        component: Option<Component>,
        window: Duration,
    ) -> EventResult<Vec<ScalingEvent>> {
        self.store.list(component, window_start(Utc::now(), window))
    }

    /// Delete events older than `retention`.
    pub fn cleanup(&self, retention: Duration) -> EventResult<usize> {
        let cutoff = window_start(Utc::now(), retention);
        let removed = self.store.delete_older_than(cutoff)?;
        if removed > 0 {
            info!(removed, %cutoff, "expired scaling events removed");
        }
        Ok(removed)
    }

    /// Aggregate the events of the trailing `window`.
    pub fn generate_report(&self, window: Duration) -> EventResult<ScalingReport> {
        let now = Utc::now();
        let events = self.store.list(None, window_start(now, window))?;
        Ok(build_report(&events, window, now))
    }

    fn notify(&self, event: &ScalingEvent) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        match notifier.try_send(Notification::from_event(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(id = %event.id, "notification channel full, dropping notification");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(id = %event.id, "notification channel closed");
            }
        }
    }

    fn publish_metrics(&self, event: &ScalingEvent) {
        let component = event.component.as_str();
        let success = if event.success { "true" } else { "false" };
        self.metrics.incr_counter(
            names::SCALING_EVENTS_TOTAL,
            &[
                ("component", component),
                ("strategy", event.strategy.as_str()),
                ("success", success),
            ],
            1.0,
        );
        self.metrics.observe(
            names::SCALING_DURATION_SECONDS,
            &[("component", component), ("strategy", event.strategy.as_str())],
            event.duration.as_secs_f64(),
        );
        self.metrics.set_gauge(
            names::REPLICAS,
            &[("component", component)],
            event.to_replicas as f64,
        );
        if let Some(impact) = &event.cost_impact {
            self.metrics.set_gauge(
                names::MONTHLY_COST_USD,
                &[("component", component)],
                impact.projected_cost,
            );
            self.metrics.set_gauge(
                names::COST_SAVINGS_USD,
                &[("component", component)],
                impact.monthly_savings,
            );
        }
    }
}

/// `now − window`, saturating at the earliest representable instant.
fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
