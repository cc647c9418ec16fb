use thiserror::Error;

use labstock_borrowing::{BorrowingId, BorrowingRecord};
use labstock_core::ExpectedVersion;
use labstock_disposal::DisposalTransaction;
use labstock_inventory::{InventoryItem, ItemId};
use labstock_maintenance::{MaintenanceTask, MaintenanceTaskId};

/// Store operation error.
///
/// These are **infrastructure** failures (missing documents, conditional
/// writes losing a race). They are mapped into the domain taxonomy at the
/// engine boundary; domain code never sees them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write found a different version than expected.
    #[error("conditional write failed: {0}")]
    Conflict(String),

    /// The addressed document does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// An insert targeted an identifier that is already taken.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// The store itself is unusable (e.g. poisoned lock).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Versioned, per-document store for ledger records.
///
/// Documents carry a version counter; updates are conditioned on the version
/// observed at read time and the store bumps it on every successful write.
/// Implementations must apply the version check and the write atomically so
/// that two writers racing on the same document cannot both succeed.
///
/// Item, task, and borrowing documents are all contended and all conditionally
/// written; disposal transactions are append-only history justifying how the
/// item's buckets changed.
pub trait LedgerStore: Send + Sync {
    fn insert_item(&self, item: InventoryItem) -> Result<(), StoreError>;
    fn load_item(&self, id: ItemId) -> Result<InventoryItem, StoreError>;

    /// Write `item` back if the stored version matches `expected`.
    ///
    /// Returns the new version on success.
    fn update_item(&self, item: InventoryItem, expected: ExpectedVersion)
    -> Result<u64, StoreError>;

    fn insert_task(&self, task: MaintenanceTask) -> Result<(), StoreError>;
    fn load_task(&self, id: MaintenanceTaskId) -> Result<MaintenanceTask, StoreError>;
    fn update_task(&self, task: MaintenanceTask, expected: ExpectedVersion)
    -> Result<u64, StoreError>;

    fn append_disposal(&self, tx: DisposalTransaction) -> Result<(), StoreError>;

    /// Replace a previously appended disposal transaction (status changes only).
    fn update_disposal(&self, tx: DisposalTransaction) -> Result<(), StoreError>;
    fn disposals_for_item(&self, id: ItemId) -> Result<Vec<DisposalTransaction>, StoreError>;

    fn insert_borrowing(&self, record: BorrowingRecord) -> Result<(), StoreError>;
    fn load_borrowing(&self, id: BorrowingId) -> Result<BorrowingRecord, StoreError>;
    fn update_borrowing(
        &self,
        record: BorrowingRecord,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError>;
}
