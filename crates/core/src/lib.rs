//! `labstock-core` — domain foundation building blocks for the quantity ledger.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod record;

pub use error::{LedgerError, LedgerResult};
pub use id::RecordId;
pub use record::{ExpectedVersion, VersionedRecord};
