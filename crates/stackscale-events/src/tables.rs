//! redb table definitions for the durable event store.
//!
//! Both tables use `&str` keys and JSON `&[u8]` values.

use redb::TableDefinition;

/// Scaling events keyed by `{component}:{event_id}`.
pub const SCALING_EVENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("scaling_events");

/// Audit records keyed by `{event_id}`.
pub const AUDIT_LOG: TableDefinition<&str, &[u8]> = TableDefinition::new("audit_log");
