use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use varscan_core::{AggregateId, ExpectedVersion};

/// An event ready to be appended to a stream (not yet assigned a sequence
/// number).
///
/// Build one from a typed domain event with [`UncommittedEvent::from_typed`]:
/// the payload is serialized to JSON and the event metadata (type name,
/// schema version, business time) rides along so history can be deserialized
/// later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A stored event in an append-only stream (assigned a sequence number).
///
/// Sequence numbers are stream-scoped, assigned by the store during append,
/// and monotonically increasing (1, 2, 3, ...) — they double as the
/// aggregate's version for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// Event store operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// Append-only event store.
///
/// Events are organized into **streams**, one per aggregate instance. Within
/// a stream, sequence numbers increase monotonically without gaps.
///
/// Implementations must:
/// - enforce optimistic concurrency (check version before append)
/// - assign sequence numbers starting at `current_version + 1`
/// - persist a batch atomically (all events or none)
pub trait EventStore: Send + Sync {
    /// Append events to an aggregate stream (append-only).
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream for an aggregate, in sequence order. An aggregate
    /// with no history yields an empty vector.
    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(aggregate_id)
    }
}

impl UncommittedEvent {
    /// Convenience constructor from a typed domain event.
    ///
    /// Keeps infra decoupled from business, while still capturing the event
    /// metadata needed for future deserialization.
    pub fn from_typed<E>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: varscan_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
