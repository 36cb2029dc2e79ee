//! stackscale-drain — remove replicas without dropping in-flight work.
//!
//! # Drain State Machine
//!
//! ```text
//! Requested → Selecting → Draining(per pod) → Verifying → Completed
//!                              │
//!                              └── deadline hit ──────────→ TimedOut
//! ```
//!
//! Per pod: check availability, cordon the node, wait for connections to
//! drain, evict with the grace period, poll until the pod is gone, then
//! uncordon the node whatever happened. Successive drains are separated by
//! a fixed pause so load can rebalance.

pub mod drainer;
pub mod error;
pub mod ops;

pub use drainer::{
    DRAIN_PAUSE, DrainOutcome, DrainPhase, EVICTION_POLL_INTERVAL, WorkloadDrainer, can_drain,
    connection_drain_delay,
};
pub use error::{DrainError, DrainResult};
pub use ops::{ClusterOps, DisruptionBudget, EvictOutcome, EvictionEvent, PodInfo};
