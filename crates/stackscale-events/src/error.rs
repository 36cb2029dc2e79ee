//! Error types for the event store.

use thiserror::Error;

/// Result type alias for event store operations.
pub type EventResult<T> = Result<T, EventError>;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("event {0} already stored")]
    Duplicate(String),
}
