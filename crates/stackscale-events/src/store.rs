//! The event store capability and its bounded in-memory implementation.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::debug;

use stackscale_core::{Component, ScalingEvent};

use crate::error::EventResult;
use crate::recorder::{AuditRecord, AuditSink};

/// Events kept by the in-memory store before the oldest are dropped.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Append-only storage for scaling events.
///
/// Implementations must tolerate `store` and `delete_older_than` running
/// concurrently.
pub trait EventStore: Send + Sync {
    /// Append one event. The event must already carry an id.
    fn store(&self, event: &ScalingEvent) -> EventResult<()>;

    /// Events with `timestamp >= since`, optionally for one component,
    /// oldest first.
    fn list(&self, component: Option<Component>, since: DateTime<Utc>)
    -> EventResult<Vec<ScalingEvent>>;

    /// Remove events with `timestamp < cutoff`; returns how many were removed.
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> EventResult<usize>;
}

/// Ring of the most recent events.
pub struct InMemoryEventStore {
    events: RwLock<VecDeque<ScalingEvent>>,
    capacity: usize,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InMemoryEventStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for InMemoryEventStore {
    fn store(&self, event: &ScalingEvent) -> EventResult<()> {
        let mut events = self.events.write().unwrap_or_else(|e| e.into_inner());
        while events.len() >= self.capacity {
            if let Some(dropped) = events.pop_front() {
                debug!(id = %dropped.id, "event store full, dropped oldest event");
            }
        }
        events.push_back(event.clone());
        Ok(())
    }

    fn list(
        &self,
        component: Option<Component>,
        since: DateTime<Utc>,
    ) -> EventResult<Vec<ScalingEvent>> {
        let events = self.events.read().unwrap_or_else(|e| e.into_inner());
        let mut matched: Vec<ScalingEvent> = events
            .iter()
            .filter(|e| component.is_none_or(|c| e.component == c))
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.timestamp);
        Ok(matched)
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> EventResult<usize> {
        let mut events = self.events.write().unwrap_or_else(|e| e.into_inner());
        let before = events.len();
        events.retain(|e| e.timestamp >= cutoff);
        Ok(before - events.len())
    }
}

/// Ring of the most recent audit records, for stores without a durable
/// audit table.
pub struct InMemoryAuditLog {
    records: RwLock<VecDeque<AuditRecord>>,
    capacity: usize,
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InMemoryAuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Records oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn write_audit(&self, record: &AuditRecord) -> EventResult<()> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
        Ok(())
    }
}
