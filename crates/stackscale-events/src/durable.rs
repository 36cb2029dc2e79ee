//! DurableEventStore — redb-backed event history.
//!
//! Every event is one record in `SCALING_EVENTS`, keyed
//! `{component}:{event_id}`, holding a JSON `StoredEvent`: the event plus
//! the labels it can be enumerated by. Existing keys are never
//! overwritten. Audit records go to `AUDIT_LOG`.
//! Any redb failure surfaces as `EventError::StorageUnavailable`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use tracing::debug;

use stackscale_core::{Component, ScalingEvent};

use crate::error::{EventError, EventResult};
use crate::recorder::{AuditRecord, AuditSink};
use crate::store::EventStore;
use crate::tables::{AUDIT_LOG, SCALING_EVENTS};

/// Convert any `Display` error into an `EventError` variant.
macro_rules! map_err {
    ($variant:ident) => {
        |e| EventError::$variant(e.to_string())
    };
}

/// Record layout of one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub labels: BTreeMap<String, String>,
    pub event: ScalingEvent,
}

impl StoredEvent {
    pub fn new(event: &ScalingEvent) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("component".to_string(), event.component.to_string());
        labels.insert("strategy".to_string(), event.strategy.to_string());
        labels.insert("success".to_string(), event.success.to_string());
        Self {
            labels,
            event: event.clone(),
        }
    }

    pub fn table_key(&self) -> String {
        event_key(&self.event)
    }
}

fn event_key(event: &ScalingEvent) -> String {
    format!("{}:{}", event.component, event.id)
}

#[derive(Clone)]
pub struct DurableEventStore {
    db: Arc<Database>,
}

impl DurableEventStore {
    /// Open (or create) a store file at `path`.
    pub fn open(path: &Path) -> EventResult<Self> {
        let db = Database::create(path).map_err(map_err!(StorageUnavailable))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "durable event store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> EventResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(StorageUnavailable))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory durable event store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> EventResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(StorageUnavailable))?;
        txn.open_table(SCALING_EVENTS)
            .map_err(map_err!(StorageUnavailable))?;
        txn.open_table(AUDIT_LOG)
            .map_err(map_err!(StorageUnavailable))?;
        txn.commit().map_err(map_err!(StorageUnavailable))?;
        Ok(())
    }

    /// Look up one event.
    pub fn get(&self, component: Component, id: &str) -> EventResult<Option<ScalingEvent>> {
        let key = format!("{component}:{id}");
        let txn = self.db.begin_read().map_err(map_err!(StorageUnavailable))?;
        let table = txn
            .open_table(SCALING_EVENTS)
            .map_err(map_err!(StorageUnavailable))?;
        match table.get(key.as_str()).map_err(map_err!(StorageUnavailable))? {
            Some(guard) => {
                let stored: StoredEvent =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(stored.event))
            }
            None => Ok(None),
        }
    }

    /// Events whose label `key` equals `value`, oldest first.
    pub fn list_by_label(&self, key: &str, value: &str) -> EventResult<Vec<ScalingEvent>> {
        let mut events: Vec<ScalingEvent> = self
            .scan(None)?
            .into_iter()
            .filter(|s| s.labels.get(key).is_some_and(|v| v == value))
            .map(|s| s.event)
            .collect();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    /// All audit records, in key order.
    pub fn list_audit(&self) -> EventResult<Vec<AuditRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(StorageUnavailable))?;
        let table = txn
            .open_table(AUDIT_LOG)
            .map_err(map_err!(StorageUnavailable))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(StorageUnavailable))? {
            let (_, value) = entry.map_err(map_err!(StorageUnavailable))?;
            let record: AuditRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Every stored record, or only those of one component (key prefix scan).
    fn scan(&self, component: Option<Component>) -> EventResult<Vec<StoredEvent>> {
        let prefix = component.map(|c| format!("{c}:"));
        let txn = self.db.begin_read().map_err(map_err!(StorageUnavailable))?;
        let table = txn
            .open_table(SCALING_EVENTS)
            .map_err(map_err!(StorageUnavailable))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(StorageUnavailable))? {
            let (key, value) = entry.map_err(map_err!(StorageUnavailable))?;
            if prefix.as_ref().is_some_and(|p| !key.value().starts_with(p.as_str())) {
                continue;
            }
            let stored: StoredEvent =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(stored);
        }
        Ok(results)
    }
}

impl EventStore for DurableEventStore {
    fn store(&self, event: &ScalingEvent) -> EventResult<()> {
        let stored = StoredEvent::new(event);
        let key = stored.table_key();
        let value = serde_json::to_vec(&stored).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(StorageUnavailable))?;
        {
            let mut table = txn
                .open_table(SCALING_EVENTS)
                .map_err(map_err!(StorageUnavailable))?;
            if table
                .get(key.as_str())
                .map_err(map_err!(StorageUnavailable))?
                .is_some()
            {
                return Err(EventError::Duplicate(key));
            }
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(StorageUnavailable))?;
        }
        txn.commit().map_err(map_err!(StorageUnavailable))?;
        debug!(%key, "scaling event stored");
        Ok(())
    }

    fn list(
        &self,
        component: Option<Component>,
        since: DateTime<Utc>,
    ) -> EventResult<Vec<ScalingEvent>> {
        let mut events: Vec<ScalingEvent> = self
            .scan(component)?
            .into_iter()
            .map(|s| s.event)
            .filter(|e| e.timestamp >= since)
            .collect();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> EventResult<usize> {
        // Selection and removal share one write transaction so a concurrent
        // `store` is either fully before or fully after the cleanup.
        let txn = self.db.begin_write().map_err(map_err!(StorageUnavailable))?;
        let count;
        {
            let mut table = txn
                .open_table(SCALING_EVENTS)
                .map_err(map_err!(StorageUnavailable))?;
            let mut expired = Vec::new();
            for entry in table.iter().map_err(map_err!(StorageUnavailable))? {
                let (key, value) = entry.map_err(map_err!(StorageUnavailable))?;
                let stored: StoredEvent =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                if stored.event.timestamp < cutoff {
                    expired.push(key.value().to_string());
                }
            }
            for key in &expired {
                table
                    .remove(key.as_str())
                    .map_err(map_err!(StorageUnavailable))?;
            }
            count = expired.len();
        }
        txn.commit().map_err(map_err!(StorageUnavailable))?;
        debug!(removed = count, %cutoff, "expired scaling events deleted");
        Ok(count)
    }
}

impl AuditSink for DurableEventStore {
    fn write_audit(&self, record: &AuditRecord) -> EventResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(StorageUnavailable))?;
        {
            let mut table = txn
                .open_table(AUDIT_LOG)
                .map_err(map_err!(StorageUnavailable))?;
            table
                .insert(record.event_id.as_str(), value.as_slice())
                .map_err(map_err!(StorageUnavailable))?;
        }
        txn.commit().map_err(map_err!(StorageUnavailable))?;
        Ok(())
    }
}
