//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value** — two with the
/// same attributes are the same value. A `Barcode` is the canonical example
/// here: "123" scanned at one till equals "123" stored on a variant; there is
/// no identity beyond the characters.
///
/// The supertraits keep implementations cheap to copy, comparable, and
/// debuggable. To "modify" a value object, construct a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
