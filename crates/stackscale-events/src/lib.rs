//! stackscale-events — the append-only history of scaling actions.
//!
//! Two interchangeable [`EventStore`] implementations:
//!
//! - [`InMemoryEventStore`]: bounded ring, oldest events dropped past capacity,
//!   with [`InMemoryAuditLog`] as its audit companion
//! - [`DurableEventStore`]: redb file (or in-memory backend), one JSON record
//!   per event keyed `{component}:{id}`, plus an audit table
//!
//! [`EventRecorder`] sits in front of a store: it assigns ids, fans events
//! out to the audit sink and the notification channel, publishes metrics,
//! and builds [`ScalingReport`]s on demand.

pub mod durable;
pub mod error;
pub mod recorder;
pub mod report;
pub mod store;
pub mod tables;

pub use durable::{DurableEventStore, StoredEvent};
pub use error::{EventError, EventResult};
pub use recorder::{AuditRecord, AuditSink, EventRecorder, Notification, Severity};
pub use report::{ComponentReport, ScalingReport, build_report};
pub use store::{DEFAULT_CAPACITY, EventStore, InMemoryAuditLog, InMemoryEventStore};
