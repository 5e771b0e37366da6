//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
///
/// Resolution ambiguity is deliberately **not** here: an ambiguous scan is a
/// normal result requiring caller-side disambiguation, not a failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty barcode, empty name).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found. For a scanned code this surfaces
    /// as "unknown barcode".
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. duplicate creation, stale version).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A non-shared barcode collides with another product's barcode.
    /// Surfaced as a blocking form-validation error on save.
    #[error("barcode {0} is already used by a product that is not a shared-barcode sibling")]
    DuplicateBarcode(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn duplicate_barcode(code: impl Into<String>) -> Self {
        Self::DuplicateBarcode(code.into())
    }
}
