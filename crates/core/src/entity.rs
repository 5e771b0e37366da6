//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Entities live inside an aggregate and keep their identity while their
/// attributes change (a product variant keeps its id while its barcode is
/// rewritten by a cascade).
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
