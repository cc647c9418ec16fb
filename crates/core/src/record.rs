//! Versioned-record traits for optimistically-concurrent documents.

use crate::error::{LedgerError, LedgerResult};

/// A persisted record whose writes are conditioned on a version counter.
///
/// The store is responsible for bumping the version on every successful
/// write; domain code only ever reads it. Conditioning an update on the
/// version observed at read time is what turns a read-validate-write cycle
/// into an atomic compare-and-swap.
pub trait VersionedRecord {
    /// Strongly-typed record identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the record identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the persisted state.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a record write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (useful for idempotent writes, migrations, etc.).
    Any,
    /// Require the record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> LedgerResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(LedgerError::concurrent(format!(
                "version check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
