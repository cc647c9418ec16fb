//! Domain error model.

use thiserror::Error;

/// Result type used across the ledger domain.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// availability, invariants). Storage concerns belong to the store layer and
/// are mapped into this taxonomy at the engine boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A quantity argument was non-positive or out of range.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Requested units exceed what is currently free to allocate.
    #[error("insufficient availability: requested {requested}, available {available}")]
    InsufficientAvailability { requested: u32, available: u32 },

    /// Disposal attempted on a category that is not disposal-eligible.
    #[error("category not disposable: {0}")]
    CategoryNotDisposable(String),

    /// The conservation law (or another ledger invariant) would be violated.
    ///
    /// This is a programming-error-level failure: validation should have
    /// rejected the operation before a post-state like this was computed.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Optimistic-concurrency retries exhausted; the caller may retry.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// A state transition conflicts with the record's current lifecycle state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found (domain-level).
    #[error("not found")]
    NotFound,
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn insufficient(requested: u32, available: u32) -> Self {
        Self::InsufficientAvailability {
            requested,
            available,
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn concurrent(msg: impl Into<String>) -> Self {
        Self::ConcurrentModification(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
