//! Command execution pipeline (application-level orchestration).
//!
//! `CatalogService` runs the full lifecycle for one template edit inside one
//! unit of work: load history, rehydrate the aggregate, handle the command,
//! append the new events with an optimistic concurrency check, and feed them
//! to the barcode index synchronously. There is no publication step: every
//! edit and scan is request/response inside the storage layer's own
//! transaction discipline, so the read model is updated before the call
//! returns.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use uuid::Uuid;

use varscan_catalog::{
    Barcode, BarcodeClaim, ProductTemplate, TemplateCommand, TemplateEvent, TemplateId,
    validate_barcode_uniqueness,
};
use varscan_core::{Aggregate, AggregateRoot, DomainError, ExpectedVersion};
use varscan_events::{EventEnvelope, ProjectionError, ProjectionRunner};
use varscan_pos::{Resolution, resolve_by_barcode};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
use crate::projections::BarcodeIndex;

const AGGREGATE_TYPE: &str = "catalog.template";

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure (e.g. stale aggregate version).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Domain-level failure (validation, invariant, not-found, duplicate
    /// barcode). Deterministic; reported to the caller, never retried.
    #[error(transparent)]
    Domain(DomainError),

    /// Failed to deserialize historical event payloads into the aggregate
    /// event type.
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    /// Persisting to the event store failed.
    #[error(transparent)]
    Store(EventStoreError),

    /// The barcode index rejected an envelope (replay/ordering bug).
    #[error("projection error: {0:?}")]
    Projection(ProjectionError),

    /// The barcode index lock was poisoned by a panicking writer.
    #[error("barcode index lock poisoned")]
    IndexPoisoned,
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        DispatchError::Domain(value)
    }
}

impl From<ProjectionError> for DispatchError {
    fn from(value: ProjectionError) -> Self {
        DispatchError::Projection(value)
    }
}

/// Catalog command + query facade over an event store and the barcode index.
///
/// Generic over the store so tests run against
/// [`InMemoryEventStore`](crate::InMemoryEventStore) and a host can bring its
/// own backend.
#[derive(Debug)]
pub struct CatalogService<S> {
    store: S,
    index: RwLock<ProjectionRunner<BarcodeIndex>>,
}

impl<S> CatalogService<S>
where
    S: EventStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            index: RwLock::new(ProjectionRunner::new(BarcodeIndex::new())),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn read_index(
        &self,
    ) -> Result<RwLockReadGuard<'_, ProjectionRunner<BarcodeIndex>>, DispatchError> {
        self.index.read().map_err(|_| DispatchError::IndexPoisoned)
    }

    fn write_index(
        &self,
    ) -> Result<RwLockWriteGuard<'_, ProjectionRunner<BarcodeIndex>>, DispatchError> {
        self.index.write().map_err(|_| DispatchError::IndexPoisoned)
    }

    fn decode(stored: &StoredEvent) -> Result<TemplateEvent, DispatchError> {
        serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))
    }

    /// Rehydrate a template from its stream. Unknown templates come back as
    /// empty (not-yet-created) aggregates, as `handle` expects.
    pub fn load_template(&self, template_id: TemplateId) -> Result<ProductTemplate, DispatchError> {
        let history = self.store.load_stream(template_id.0)?;
        let mut template = ProductTemplate::empty(template_id);
        for stored in &history {
            template.apply(&Self::decode(stored)?);
        }
        Ok(template)
    }

    /// Execute one catalog command: rehydrate, decide, append, project.
    ///
    /// An idempotent no-op command (e.g. re-enabling sharing that is already
    /// active) returns an empty vector and touches neither store nor index.
    pub fn execute(&self, command: &TemplateCommand) -> Result<Vec<StoredEvent>, DispatchError> {
        let template_id = command.template_id();
        let template = self.load_template(template_id)?;

        let events = template.handle(command).map_err(DispatchError::Domain)?;
        if events.is_empty() {
            return Ok(vec![]);
        }

        let mut uncommitted = Vec::with_capacity(events.len());
        for event in &events {
            uncommitted.push(UncommittedEvent::from_typed(
                template_id.0,
                AGGREGATE_TYPE,
                Uuid::now_v7(),
                event,
            )?);
        }

        let stored = self
            .store
            .append(uncommitted, ExpectedVersion::Exact(template.version()))?;

        let mut index = self.write_index()?;
        for stored_event in &stored {
            let event = Self::decode(stored_event)?;
            tracing::debug!(
                event_type = stored_event.event_type.as_str(),
                template_id = %template_id,
                sequence = stored_event.sequence_number,
                "applying catalog event to barcode index"
            );
            index.apply(&EventEnvelope::new(
                stored_event.event_id,
                stored_event.aggregate_id,
                stored_event.aggregate_type.clone(),
                stored_event.sequence_number,
                event,
            ))?;
        }

        Ok(stored)
    }

    /// Resolve a scanned code against the live index.
    pub fn resolve_by_barcode(
        &self,
        code: &Barcode,
        pos_only: bool,
    ) -> Result<Resolution, DispatchError> {
        let index = self.read_index()?;
        resolve_by_barcode(index.projection(), code, pos_only).map_err(DispatchError::Domain)
    }

    /// Validate a freshly edited variant barcode against the live index.
    pub fn validate_barcode_uniqueness(&self, claim: &BarcodeClaim) -> Result<(), DispatchError> {
        let index = self.read_index()?;
        validate_barcode_uniqueness(index.projection(), claim).map_err(DispatchError::Domain)
    }
}
