//! Projection runner utilities (read model builders).
//!
//! Read models are **disposable**; events are the source of truth. This
//! module provides deterministic replay with per-stream cursor tracking,
//! without making storage assumptions.

use std::collections::HashMap;

use varscan_core::AggregateId;

use crate::{EventEnvelope, Projection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    /// An envelope arrived out of order (or was already applied) for its stream.
    NonMonotonicSequence {
        aggregate_id: AggregateId,
        last: u64,
        found: u64,
    },
}

/// Runs envelopes through a projection and tracks progress.
///
/// Sequence numbers are per aggregate stream, so the runner keeps one cursor
/// per `aggregate_id`: a projection consuming events from many template
/// streams still gets monotonicity enforcement on each stream independently.
#[derive(Debug)]
pub struct ProjectionRunner<P>
where
    P: Projection,
{
    projection: P,
    cursors: HashMap<AggregateId, u64>,
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new(projection: P) -> Self {
        Self {
            projection,
            cursors: HashMap::new(),
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn projection_mut(&mut self) -> &mut P {
        &mut self.projection
    }

    pub fn into_projection(self) -> P {
        self.projection
    }

    /// Last applied sequence number for a stream, if any envelope was applied.
    pub fn cursor(&self, aggregate_id: AggregateId) -> Option<u64> {
        self.cursors.get(&aggregate_id).copied()
    }

    /// Apply a single envelope, enforcing monotonic sequencing per stream.
    pub fn apply(&mut self, envelope: &EventEnvelope<P::Ev>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let found = envelope.sequence_number();
        let last = self.cursors.get(&aggregate_id).copied().unwrap_or(0);

        if found <= last {
            return Err(ProjectionError::NonMonotonicSequence {
                aggregate_id,
                last,
                found,
            });
        }

        self.projection.apply(envelope);
        self.cursors.insert(aggregate_id, found);
        Ok(())
    }

    /// Apply many envelopes in order.
    pub fn run<'a>(
        &mut self,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<(), ProjectionError>
    where
        P::Ev: 'a,
    {
        for env in envelopes {
            self.apply(env)?;
        }
        Ok(())
    }

    /// Rebuild a projection from scratch by replaying the full event history.
    ///
    /// The factory is used to create a fresh projection instance.
    pub fn rebuild_from_scratch<'a>(
        factory: impl FnOnce() -> P,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<P, ProjectionError>
    where
        P::Ev: 'a,
    {
        let mut runner = ProjectionRunner::new(factory());
        runner.run(envelopes)?;
        Ok(runner.projection)
    }
}
