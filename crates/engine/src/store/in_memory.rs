use std::collections::HashMap;
use std::sync::RwLock;

use labstock_borrowing::{BorrowingId, BorrowingRecord};
use labstock_core::{ExpectedVersion, VersionedRecord};
use labstock_disposal::DisposalTransaction;
use labstock_inventory::{InventoryItem, ItemId};
use labstock_maintenance::{MaintenanceTask, MaintenanceTaskId};

use super::r#trait::{LedgerStore, StoreError};

/// In-memory versioned document store.
///
/// Intended for tests/dev. Each collection sits behind its own lock; the
/// version check and the write happen under a single write-lock acquisition,
/// which is what makes each conditional update atomic.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    items: RwLock<HashMap<ItemId, InventoryItem>>,
    tasks: RwLock<HashMap<MaintenanceTaskId, MaintenanceTask>>,
    disposals: RwLock<Vec<DisposalTransaction>>,
    borrowings: RwLock<HashMap<BorrowingId, BorrowingRecord>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl LedgerStore for InMemoryLedgerStore {
    fn insert_item(&self, item: InventoryItem) -> Result<(), StoreError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let id = item.id_typed();
        if items.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("item {id}")));
        }
        items.insert(id, item);
        Ok(())
    }

    fn load_item(&self, id: ItemId) -> Result<InventoryItem, StoreError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        items
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("item {id}")))
    }

    fn update_item(
        &self,
        mut item: InventoryItem,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let id = item.id_typed();
        let current = items
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("item {id}")))?;

        if !expected.matches(current.version()) {
            return Err(StoreError::Conflict(format!(
                "item {id}: expected {expected:?}, found {}",
                current.version()
            )));
        }

        let next = current.version() + 1;
        item.set_version(next);
        items.insert(id, item);
        Ok(next)
    }

    fn insert_task(&self, task: MaintenanceTask) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().map_err(|_| poisoned())?;
        let id = task.id_typed();
        if tasks.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("task {id}")));
        }
        tasks.insert(id, task);
        Ok(())
    }

    fn load_task(&self, id: MaintenanceTaskId) -> Result<MaintenanceTask, StoreError> {
        let tasks = self.tasks.read().map_err(|_| poisoned())?;
        tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("task {id}")))
    }

    fn update_task(
        &self,
        mut task: MaintenanceTask,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        let mut tasks = self.tasks.write().map_err(|_| poisoned())?;
        let id = task.id_typed();
        let current = tasks
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("task {id}")))?;

        if !expected.matches(current.version()) {
            return Err(StoreError::Conflict(format!(
                "task {id}: expected {expected:?}, found {}",
                current.version()
            )));
        }

        let next = current.version() + 1;
        task.set_version(next);
        tasks.insert(id, task);
        Ok(next)
    }

    fn append_disposal(&self, tx: DisposalTransaction) -> Result<(), StoreError> {
        let mut disposals = self.disposals.write().map_err(|_| poisoned())?;
        disposals.push(tx);
        Ok(())
    }

    fn update_disposal(&self, tx: DisposalTransaction) -> Result<(), StoreError> {
        let mut disposals = self.disposals.write().map_err(|_| poisoned())?;
        let id = tx.id_typed();
        let slot = disposals
            .iter_mut()
            .find(|existing| existing.id_typed() == id)
            .ok_or_else(|| StoreError::NotFound(format!("disposal {id}")))?;
        *slot = tx;
        Ok(())
    }

    fn disposals_for_item(&self, id: ItemId) -> Result<Vec<DisposalTransaction>, StoreError> {
        let disposals = self.disposals.read().map_err(|_| poisoned())?;
        Ok(disposals
            .iter()
            .filter(|tx| tx.item_id() == id)
            .cloned()
            .collect())
    }

    fn insert_borrowing(&self, record: BorrowingRecord) -> Result<(), StoreError> {
        let mut borrowings = self.borrowings.write().map_err(|_| poisoned())?;
        let id = record.id_typed();
        if borrowings.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("borrowing {id}")));
        }
        borrowings.insert(id, record);
        Ok(())
    }

    fn load_borrowing(&self, id: BorrowingId) -> Result<BorrowingRecord, StoreError> {
        let borrowings = self.borrowings.read().map_err(|_| poisoned())?;
        borrowings
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("borrowing {id}")))
    }

    fn update_borrowing(
        &self,
        mut record: BorrowingRecord,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        let mut borrowings = self.borrowings.write().map_err(|_| poisoned())?;
        let id = record.id_typed();
        let current = borrowings
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("borrowing {id}")))?;

        if !expected.matches(current.version()) {
            return Err(StoreError::Conflict(format!(
                "borrowing {id}: expected {expected:?}, found {}",
                current.version()
            )));
        }

        let next = current.version() + 1;
        record.set_version(next);
        borrowings.insert(id, record);
        Ok(next)
    }
}
