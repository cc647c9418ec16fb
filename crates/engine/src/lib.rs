//! Stock allocation engine.
//!
//! The only component permitted to mutate an item's quantity buckets. It
//! composes the pure domain crates with a versioned document store and turns
//! every operation into a read-validate-write cycle with bounded retry on
//! write conflicts.

pub mod engine;
pub mod store;

pub use engine::AllocationEngine;
pub use store::{InMemoryLedgerStore, LedgerStore, StoreError};
