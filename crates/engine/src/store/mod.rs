//! Versioned document store for ledger records.

mod in_memory;
mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use r#trait::{LedgerStore, StoreError};
