//! Infrastructure for the shared-barcode catalog: in-memory event store,
//! the barcode index read model, and the command pipeline gluing them to the
//! domain. Intended for tests/dev and as the reference wiring for a host
//! application that brings its own storage.

pub mod catalog_service;
pub mod event_store;
pub mod projections;

#[cfg(test)]
mod integration_tests;

pub use catalog_service::{CatalogService, DispatchError};
pub use event_store::{
    EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent,
};
pub use projections::BarcodeIndex;
