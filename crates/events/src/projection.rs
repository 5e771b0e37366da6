use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Projections are the query side of the catalog: they transform write-model
/// events into state optimized for lookups (e.g. barcode → variants). Events
/// are the source of truth; a read model is disposable and can be rebuilt
/// from scratch by replaying the full history.
///
/// Implementations must be **idempotent** per envelope: applying the same
/// envelope twice must produce the same read-model state. The
/// [`ProjectionRunner`](crate::ProjectionRunner) helps by tracking sequence
/// numbers per stream and rejecting replays, but projections should still be
/// written so that a duplicate apply is harmless.
///
/// Persistence of the read model is out of scope here; implementations decide
/// whether state lives in memory, a database, or elsewhere.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
