use chrono::{DateTime, Utc};

use labstock_borrowing::{BorrowingId, BorrowingRecord};
use labstock_core::{ExpectedVersion, LedgerError, LedgerResult, RecordId, VersionedRecord};
use labstock_disposal::{DisposalGate, DisposalId, DisposalTransaction};
use labstock_inventory::{Borrowability, InventoryItem, ItemId, QuantityBreakdown};
use labstock_maintenance::{MaintenanceProgress, MaintenanceTask, MaintenanceTaskId};

use crate::store::{LedgerStore, StoreError};

/// Write attempts per operation before giving up with `ConcurrentModification`.
const MAX_ATTEMPTS: u32 = 3;

fn map_store(err: StoreError) -> LedgerError {
    match err {
        StoreError::Conflict(msg) => LedgerError::concurrent(msg),
        StoreError::NotFound(_) => LedgerError::not_found(),
        StoreError::Duplicate(msg) => LedgerError::conflict(msg),
        StoreError::Unavailable(msg) => LedgerError::conflict(msg),
    }
}

/// The stock allocation engine.
///
/// Every mutating operation is a read-validate-write cycle: load the current
/// item document, validate and compute the next state through the pure
/// domain types, then write back conditioned on the version read. A losing
/// writer retries the whole cycle a bounded number of times before failing
/// with `ConcurrentModification`; operations on different items never
/// contend.
///
/// Operations that touch two documents never leave one side applied alone.
/// Task progress and borrowing transitions commit the justifying record
/// first, conditioned on that record's own version, then move the item's
/// units; if the item write cannot land, the record write is rolled back.
/// Conditioning each document on its own version means a stale read of
/// either side loses its write and retries against fresh state.
#[derive(Debug)]
pub struct AllocationEngine<S> {
    store: S,
}

impl<S> AllocationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S: LedgerStore> AllocationEngine<S> {
    /// Register a new item document.
    pub fn register_item(&self, item: InventoryItem) -> LedgerResult<()> {
        let id = item.id_typed();
        self.store.insert_item(item).map_err(map_store)?;
        tracing::info!("registered item {id}");
        Ok(())
    }

    /// Run one read-validate-write cycle with bounded retry on conflicts.
    fn update_item_with_retry<T>(
        &self,
        item_id: ItemId,
        op: &str,
        mut apply: impl FnMut(&mut InventoryItem) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        for attempt in 1..=MAX_ATTEMPTS {
            let mut item = self.store.load_item(item_id).map_err(map_store)?;
            let expected = ExpectedVersion::Exact(item.version());

            let value = match apply(&mut item) {
                Ok(value) => value,
                Err(err) => {
                    if matches!(err, LedgerError::InvariantViolation(_)) {
                        // Validation should have caught this; never persist it.
                        tracing::error!("{op} on item {item_id} aborted: {err}");
                    }
                    return Err(err);
                }
            };

            match self.store.update_item(item, expected) {
                Ok(_) => return Ok(value),
                Err(StoreError::Conflict(_)) => {
                    tracing::warn!(
                        "{op} on item {item_id} lost a write race (attempt {attempt}/{MAX_ATTEMPTS})"
                    );
                }
                Err(err) => return Err(map_store(err)),
            }
        }

        Err(LedgerError::concurrent(format!(
            "{op} on item {item_id}: retries exhausted after {MAX_ATTEMPTS} attempts"
        )))
    }

    /// Reserve `qty` available units for a new maintenance task.
    pub fn reserve_for_maintenance(
        &self,
        item_id: ItemId,
        qty: u32,
        due_date: DateTime<Utc>,
    ) -> LedgerResult<MaintenanceTask> {
        let task = MaintenanceTask::schedule(
            MaintenanceTaskId::new(RecordId::new()),
            item_id,
            qty,
            due_date,
            Utc::now(),
        )?;

        self.update_item_with_retry(item_id, "reserve_for_maintenance", |item| {
            item.reserve_for_maintenance(qty)
        })?;
        if let Err(err) = self.store.insert_task(task.clone()) {
            // No task document means nothing justifies the reservation;
            // put the units back before surfacing the failure.
            if let Err(comp) = self.update_item_with_retry(item_id, "reserve_for_maintenance", |item| {
                item.release_from_maintenance(qty)
            }) {
                tracing::error!(
                    "could not release {qty} units of item {item_id} after failed task insert: {comp}"
                );
            }
            return Err(map_store(err));
        }

        tracing::info!(
            "reserved {qty} units of item {item_id} for maintenance task {}",
            task.id_typed()
        );
        Ok(task)
    }

    /// Record cumulative maintenance progress on a task.
    ///
    /// The delta against the previously recorded total is released back to
    /// the owning item's `available` bucket; reaching the full reserved
    /// quantity completes the task. Repeating an already-recorded total is a
    /// no-op.
    pub fn record_maintenance_progress(
        &self,
        task_id: MaintenanceTaskId,
        maintained_qty: u32,
    ) -> LedgerResult<MaintenanceTask> {
        for attempt in 1..=MAX_ATTEMPTS {
            // Reload the task each attempt; a concurrent recorder may have
            // advanced it, which changes the delta we are responsible for.
            let original = self.store.load_task(task_id).map_err(map_store)?;
            let mut task = original.clone();
            let released = task.record_progress(maintained_qty)?;
            if released == 0 {
                return Ok(task);
            }

            // The task's own conditional write is the serialization point:
            // only the writer that saw the latest total gets to release units.
            let expected = ExpectedVersion::Exact(original.version());
            let version = match self.store.update_task(task.clone(), expected) {
                Ok(version) => version,
                Err(StoreError::Conflict(_)) => {
                    tracing::warn!(
                        "progress on task {task_id} lost a write race (attempt {attempt}/{MAX_ATTEMPTS})"
                    );
                    continue;
                }
                Err(err) => return Err(map_store(err)),
            };

            let item_id = task.item_id();
            if let Err(err) = self.update_item_with_retry(item_id, "record_maintenance_progress", |item| {
                item.release_from_maintenance(released)
            }) {
                self.rollback_task(original, version, "progress");
                return Err(err);
            }

            task.set_version(version);
            tracing::info!(
                "task {task_id}: {} of {} units maintained, {released} released to item {item_id}",
                task.maintained_quantity(),
                task.quantity()
            );
            return Ok(task);
        }

        Err(LedgerError::concurrent(format!(
            "progress on task {task_id}: retries exhausted after {MAX_ATTEMPTS} attempts"
        )))
    }

    /// Restore a task's pre-update state after the paired item write failed.
    fn rollback_task(&self, original: MaintenanceTask, committed_version: u64, op: &str) {
        let task_id = original.id_typed();
        let expected = ExpectedVersion::Exact(committed_version);
        if let Err(err) = self.store.update_task(original, expected) {
            tracing::error!("{op} on task {task_id}: rollback after failed item write lost: {err}");
        }
    }

    /// Cancel a maintenance task, releasing its unreconciled remainder.
    pub fn cancel_maintenance(&self, task_id: MaintenanceTaskId) -> LedgerResult<MaintenanceTask> {
        for attempt in 1..=MAX_ATTEMPTS {
            let original = self.store.load_task(task_id).map_err(map_store)?;
            let mut task = original.clone();
            let remainder = task.cancel()?;

            let expected = ExpectedVersion::Exact(original.version());
            let version = match self.store.update_task(task.clone(), expected) {
                Ok(version) => version,
                Err(StoreError::Conflict(_)) => {
                    tracing::warn!(
                        "cancel of task {task_id} lost a write race (attempt {attempt}/{MAX_ATTEMPTS})"
                    );
                    continue;
                }
                Err(err) => return Err(map_store(err)),
            };

            let item_id = task.item_id();
            if remainder > 0 {
                if let Err(err) = self.update_item_with_retry(item_id, "cancel_maintenance", |item| {
                    item.release_from_maintenance(remainder)
                }) {
                    self.rollback_task(original, version, "cancel");
                    return Err(err);
                }
            }

            task.set_version(version);
            tracing::info!(
                "cancelled task {task_id}, released {remainder} units to item {item_id}"
            );
            return Ok(task);
        }

        Err(LedgerError::concurrent(format!(
            "cancel of task {task_id}: retries exhausted after {MAX_ATTEMPTS} attempts"
        )))
    }

    /// Permanently remove `qty` available units of a disposal-eligible item.
    pub fn dispose_units(
        &self,
        item_id: ItemId,
        qty: u32,
        reason: impl Into<String>,
    ) -> LedgerResult<DisposalTransaction> {
        let mut tx = DisposalTransaction::new(
            DisposalId::new(RecordId::new()),
            item_id,
            qty,
            reason,
            Utc::now(),
        )?;

        // Cheap precheck so outright invalid requests (wrong category, more
        // than available) are refused before any record exists. The
        // authoritative check runs again inside the write cycle.
        let current = self.store.load_item(item_id).map_err(map_store)?;
        DisposalGate::check(&current, qty)?;

        // The pending transaction lands before any units move, so a quantity
        // change is always backed by a persisted record; nothing acts on a
        // pending disposal, so a leftover cancelled one is just history.
        self.store.append_disposal(tx.clone()).map_err(map_store)?;

        let moved = self.update_item_with_retry(item_id, "dispose_units", |item| {
            DisposalGate::check(item, qty)?;
            item.dispose(qty)
        });
        match moved {
            Ok(()) => {
                tx.complete()?;
                self.store.update_disposal(tx.clone()).map_err(map_store)?;
                tracing::info!("disposed {qty} units of item {item_id}");
                Ok(tx)
            }
            Err(err) => {
                if tx.cancel().is_ok() {
                    if let Err(store_err) = self.store.update_disposal(tx) {
                        tracing::error!(
                            "could not cancel disposal record for item {item_id}: {store_err}"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Move `qty` units from `available` to `borrowed`.
    ///
    /// Eligibility is evaluated inside the cycle, against the freshly loaded
    /// record; the display-side evaluation is never trusted here.
    pub fn reserve_for_borrow(&self, item_id: ItemId, qty: u32) -> LedgerResult<()> {
        self.update_item_with_retry(item_id, "reserve_for_borrow", |item| {
            item.reserve_for_borrow(qty)
        })
    }

    /// Return `qty` borrowed units to `available`.
    pub fn release_from_borrow(&self, item_id: ItemId, qty: u32) -> LedgerResult<()> {
        self.update_item_with_retry(item_id, "release_from_borrow", |item| {
            item.release_from_borrow(qty)
        })
    }

    /// File a borrowing request for one unit. No quantity moves until
    /// approval.
    pub fn request_borrow(&self, item_id: ItemId) -> LedgerResult<BorrowingRecord> {
        // The item must exist before a request can reference it.
        self.store.load_item(item_id).map_err(map_store)?;
        let record = BorrowingRecord::request(BorrowingId::new(RecordId::new()), item_id, Utc::now());
        self.store
            .insert_borrowing(record.clone())
            .map_err(map_store)?;
        Ok(record)
    }

    /// Read-validate-write cycle on a borrowing record with bounded retry.
    ///
    /// Returns the pre-update record alongside the committed one so callers
    /// pairing the transition with an item write can roll it back.
    fn update_borrowing_with_retry(
        &self,
        borrowing_id: BorrowingId,
        op: &str,
        mut apply: impl FnMut(&mut BorrowingRecord) -> LedgerResult<()>,
    ) -> LedgerResult<(BorrowingRecord, BorrowingRecord)> {
        for attempt in 1..=MAX_ATTEMPTS {
            let original = self.store.load_borrowing(borrowing_id).map_err(map_store)?;
            let mut record = original.clone();
            apply(&mut record)?;

            let expected = ExpectedVersion::Exact(original.version());
            match self.store.update_borrowing(record.clone(), expected) {
                Ok(version) => {
                    record.set_version(version);
                    return Ok((original, record));
                }
                Err(StoreError::Conflict(_)) => {
                    tracing::warn!(
                        "{op} on borrowing {borrowing_id} lost a write race (attempt {attempt}/{MAX_ATTEMPTS})"
                    );
                }
                Err(err) => return Err(map_store(err)),
            }
        }

        Err(LedgerError::concurrent(format!(
            "{op} on borrowing {borrowing_id}: retries exhausted after {MAX_ATTEMPTS} attempts"
        )))
    }

    /// Restore a borrowing record's pre-update state after the paired item
    /// write failed.
    fn rollback_borrowing(&self, original: BorrowingRecord, committed_version: u64, op: &str) {
        let borrowing_id = original.id_typed();
        let expected = ExpectedVersion::Exact(committed_version);
        if let Err(err) = self.store.update_borrowing(original, expected) {
            tracing::error!(
                "{op} on borrowing {borrowing_id}: rollback after failed item write lost: {err}"
            );
        }
    }

    /// Approve a pending borrowing request, reserving its unit.
    ///
    /// The record's conditional write settles racing approvals: the loser
    /// retries, finds the request no longer pending, and fails cleanly
    /// without touching the item.
    pub fn approve_borrow(
        &self,
        borrowing_id: BorrowingId,
        return_date: DateTime<Utc>,
    ) -> LedgerResult<BorrowingRecord> {
        let (original, record) =
            self.update_borrowing_with_retry(borrowing_id, "approve_borrow", |record| {
                record.approve(return_date)
            })?;

        if let Err(err) = self.reserve_for_borrow(record.item_id(), 1) {
            self.rollback_borrowing(original, record.version(), "approve_borrow");
            return Err(err);
        }

        tracing::info!("approved borrowing {borrowing_id} for item {}", record.item_id());
        Ok(record)
    }

    /// Reject a pending borrowing request. No quantity was reserved yet.
    pub fn reject_borrow(&self, borrowing_id: BorrowingId) -> LedgerResult<BorrowingRecord> {
        let (_, record) =
            self.update_borrowing_with_retry(borrowing_id, "reject_borrow", |record| {
                record.reject()
            })?;
        Ok(record)
    }

    /// Record the return of a borrowed unit, releasing it to `available`.
    pub fn return_borrow(&self, borrowing_id: BorrowingId) -> LedgerResult<BorrowingRecord> {
        let (original, record) =
            self.update_borrowing_with_retry(borrowing_id, "return_borrow", |record| {
                record.mark_returned()
            })?;

        if let Err(err) = self.release_from_borrow(record.item_id(), 1) {
            self.rollback_borrowing(original, record.version(), "return_borrow");
            return Err(err);
        }

        tracing::info!("returned borrowing {borrowing_id} for item {}", record.item_id());
        Ok(record)
    }

    /// Administrative edit of an item's total quantity.
    pub fn adjust_total_quantity(&self, item_id: ItemId, new_quantity: u32) -> LedgerResult<()> {
        self.update_item_with_retry(item_id, "adjust_total_quantity", |item| {
            item.adjust_total(new_quantity)
        })
    }

    // Read surface for the management UIs.

    /// Current quantity buckets of an item.
    pub fn quantity_breakdown(&self, item_id: ItemId) -> LedgerResult<QuantityBreakdown> {
        let item = self.store.load_item(item_id).map_err(map_store)?;
        Ok(item.breakdown())
    }

    /// Borrowing eligibility with per-rule refusal reasons, for badges.
    pub fn borrowability(&self, item_id: ItemId) -> LedgerResult<Borrowability> {
        let item = self.store.load_item(item_id).map_err(map_store)?;
        Ok(item.borrowability())
    }

    /// Progress snapshot of a maintenance task, for progress bars.
    pub fn maintenance_progress(
        &self,
        task_id: MaintenanceTaskId,
    ) -> LedgerResult<MaintenanceProgress> {
        let task = self.store.load_task(task_id).map_err(map_store)?;
        Ok(task.progress())
    }

    /// Disposal history of an item.
    pub fn disposal_history(&self, item_id: ItemId) -> LedgerResult<Vec<DisposalTransaction>> {
        self.store.disposals_for_item(item_id).map_err(map_store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLedgerStore;
    use chrono::Duration;
    use labstock_disposal::DisposalStatus;
    use labstock_inventory::ItemCategory;
    use labstock_maintenance::TaskStatus;
    use labstock_borrowing::BorrowStatus;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Barrier};

    fn engine() -> AllocationEngine<InMemoryLedgerStore> {
        AllocationEngine::new(InMemoryLedgerStore::new())
    }

    fn register(
        engine: &AllocationEngine<impl LedgerStore>,
        category: ItemCategory,
        quantity: u32,
    ) -> ItemId {
        let item = InventoryItem::new(
            ItemId::new(RecordId::new()),
            "Test stock",
            category,
            quantity,
        )
        .unwrap();
        let id = item.id_typed();
        engine.register_item(item).unwrap();
        id
    }

    fn due_in_a_week() -> DateTime<Utc> {
        Utc::now() + Duration::days(7)
    }

    fn assert_conserved(engine: &AllocationEngine<impl LedgerStore>, item_id: ItemId) {
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!(
            b.available + b.borrowed + b.maintenance + b.disposed,
            b.quantity
        );
    }

    #[test]
    fn maintenance_reservation_and_full_completion() {
        let engine = engine();
        let item_id = register(&engine, ItemCategory::Equipment, 10);

        let task = engine
            .reserve_for_maintenance(item_id, 4, due_in_a_week())
            .unwrap();
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.maintenance), (6, 4));

        let task = engine
            .record_maintenance_progress(task.id_typed(), 4)
            .unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.maintenance), (10, 0));
        assert_conserved(&engine, item_id);
    }

    #[test]
    fn partial_completion_leaves_the_remainder_reserved() {
        let engine = engine();
        let item_id = register(&engine, ItemCategory::Equipment, 10);

        let task = engine
            .reserve_for_maintenance(item_id, 4, due_in_a_week())
            .unwrap();
        let task = engine
            .record_maintenance_progress(task.id_typed(), 2)
            .unwrap();

        assert_eq!(task.status(), TaskStatus::InProgress);
        assert_eq!(task.remaining_quantity(), 2);
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.maintenance), (8, 2));

        let progress = engine.maintenance_progress(task.id_typed()).unwrap();
        assert_eq!(progress.remaining, 2);
    }

    #[test]
    fn repeated_progress_total_moves_no_units() {
        let engine = engine();
        let item_id = register(&engine, ItemCategory::Equipment, 10);

        let task = engine
            .reserve_for_maintenance(item_id, 4, due_in_a_week())
            .unwrap();
        engine
            .record_maintenance_progress(task.id_typed(), 3)
            .unwrap();
        let before = engine.quantity_breakdown(item_id).unwrap();

        engine
            .record_maintenance_progress(task.id_typed(), 3)
            .unwrap();
        assert_eq!(engine.quantity_breakdown(item_id).unwrap(), before);
    }

    #[test]
    fn cancellation_returns_the_unreconciled_remainder() {
        let engine = engine();
        let item_id = register(&engine, ItemCategory::Equipment, 10);

        let task = engine
            .reserve_for_maintenance(item_id, 4, due_in_a_week())
            .unwrap();
        engine
            .record_maintenance_progress(task.id_typed(), 1)
            .unwrap();
        let task = engine.cancel_maintenance(task.id_typed()).unwrap();

        assert_eq!(task.status(), TaskStatus::Cancelled);
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.maintenance), (10, 0));
        assert_conserved(&engine, item_id);
    }

    #[test]
    fn over_allocation_is_rejected_without_state_change() {
        let engine = engine();
        let item_id = register(&engine, ItemCategory::Equipment, 2);

        let err = engine
            .reserve_for_maintenance(item_id, 3, due_in_a_week())
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientAvailability {
                requested: 3,
                available: 2
            }
        );
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.maintenance), (2, 0));
    }

    #[test]
    fn disposal_rejected_for_ineligible_category() {
        let engine = engine();
        let item_id = register(&engine, ItemCategory::Equipment, 5);

        let err = engine.dispose_units(item_id, 1, "broken").unwrap_err();
        assert!(matches!(err, LedgerError::CategoryNotDisposable(_)));
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!(b.available, 5);
        assert_eq!(b.disposed, 0);
        assert!(engine.disposal_history(item_id).unwrap().is_empty());
    }

    #[test]
    fn disposal_records_a_completed_transaction() {
        let engine = engine();
        let item_id = register(&engine, ItemCategory::Consumables, 10);

        let tx = engine.dispose_units(item_id, 3, "expired").unwrap();
        assert_eq!(tx.status(), DisposalStatus::Completed);
        assert_eq!(tx.disposal_quantity(), 3);

        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.disposed), (7, 3));
        assert_conserved(&engine, item_id);

        let history = engine.disposal_history(item_id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason(), "expired");
    }

    #[test]
    fn borrow_workflow_moves_one_unit_on_approval_and_return() {
        let engine = engine();
        let item_id = register(&engine, ItemCategory::Equipment, 3);

        let record = engine.request_borrow(item_id).unwrap();
        // A pending request reserves nothing.
        assert_eq!(engine.quantity_breakdown(item_id).unwrap().borrowed, 0);

        let record = engine
            .approve_borrow(record.id_typed(), due_in_a_week())
            .unwrap();
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.borrowed), (2, 1));

        engine.return_borrow(record.id_typed()).unwrap();
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.borrowed), (3, 0));
        assert_conserved(&engine, item_id);
    }

    #[test]
    fn rejecting_a_pending_request_moves_nothing() {
        let engine = engine();
        let item_id = register(&engine, ItemCategory::Equipment, 3);

        let record = engine.request_borrow(item_id).unwrap();
        engine.reject_borrow(record.id_typed()).unwrap();
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.borrowed), (3, 0));
    }

    #[test]
    fn approval_reevaluates_eligibility_authoritatively() {
        let engine = engine();
        let item_id = register(&engine, ItemCategory::Equipment, 3);
        let record = engine.request_borrow(item_id).unwrap();

        // Admin disables borrowing after the request was filed.
        let mut item = engine.store().load_item(item_id).unwrap();
        item.set_can_be_borrowed(Some(false));
        let expected = ExpectedVersion::Exact(item.version());
        engine.store().update_item(item, expected).unwrap();

        let err = engine
            .approve_borrow(record.id_typed(), due_in_a_week())
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(engine.quantity_breakdown(item_id).unwrap().borrowed, 0);
        // The failed approval rolls the record back to pending.
        let record = engine.store().load_borrowing(record.id_typed()).unwrap();
        assert_eq!(record.status(), BorrowStatus::Pending);
    }

    #[test]
    fn adjust_total_rejects_shrinking_below_allocations() {
        let engine = engine();
        let item_id = register(&engine, ItemCategory::Equipment, 10);
        engine
            .reserve_for_maintenance(item_id, 4, due_in_a_week())
            .unwrap();

        let err = engine.adjust_total_quantity(item_id, 3).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        engine.adjust_total_quantity(item_id, 12).unwrap();
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.quantity, b.available, b.maintenance), (12, 8, 4));
        assert_conserved(&engine, item_id);
    }

    #[test]
    fn unknown_ids_surface_not_found() {
        let engine = engine();
        let missing = ItemId::new(RecordId::new());
        assert_eq!(
            engine.quantity_breakdown(missing).unwrap_err(),
            LedgerError::NotFound
        );
        assert_eq!(
            engine.reserve_for_borrow(missing, 1).unwrap_err(),
            LedgerError::NotFound
        );
    }

    #[test]
    fn concurrent_borrow_and_dispose_admit_exactly_one_winner() {
        let engine = Arc::new(AllocationEngine::new(InMemoryLedgerStore::new()));
        let item_id = register(engine.as_ref(), ItemCategory::Consumables, 5);

        let barrier = Arc::new(Barrier::new(2));
        let (borrow_res, dispose_res) = std::thread::scope(|scope| {
            let borrow = {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                scope.spawn(move || {
                    barrier.wait();
                    engine.reserve_for_borrow(item_id, 5)
                })
            };
            let dispose = {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                scope.spawn(move || {
                    barrier.wait();
                    engine.dispose_units(item_id, 5, "stress test").map(|_| ())
                })
            };
            (borrow.join().unwrap(), dispose.join().unwrap())
        });

        let successes = [borrow_res.is_ok(), dispose_res.is_ok()]
            .iter()
            .filter(|ok| **ok)
            .count();
        assert_eq!(successes, 1, "exactly one of the two operations must win");

        for res in [&borrow_res, &dispose_res] {
            if let Err(err) = res {
                assert!(
                    matches!(
                        err,
                        LedgerError::InsufficientAvailability { .. }
                            | LedgerError::ConcurrentModification(_)
                    ),
                    "unexpected loser error: {err:?}"
                );
            }
        }

        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!(
            b.available + b.borrowed + b.maintenance + b.disposed,
            b.quantity
        );
        assert_eq!(b.available, 0);
        assert!(b.borrowed == 5 || b.disposed == 5);
    }

    /// Store wrapper with injectable failures, delegating to the in-memory
    /// store. `stall_next_task_write` parks exactly one task write between
    /// the `parked` and `resume` barriers so a second writer can slip in.
    struct FaultStore {
        inner: InMemoryLedgerStore,
        item_write_conflicts: AtomicU32,
        fail_insert_task: AtomicBool,
        fail_append_disposal: AtomicBool,
        stall_next_task_write: AtomicBool,
        parked: Barrier,
        resume: Barrier,
    }

    impl FaultStore {
        fn new() -> Self {
            Self {
                inner: InMemoryLedgerStore::new(),
                item_write_conflicts: AtomicU32::new(0),
                fail_insert_task: AtomicBool::new(false),
                fail_append_disposal: AtomicBool::new(false),
                stall_next_task_write: AtomicBool::new(false),
                parked: Barrier::new(2),
                resume: Barrier::new(2),
            }
        }

        fn with_item_write_conflicts(conflicts: u32) -> Self {
            let store = Self::new();
            store.item_write_conflicts.store(conflicts, Ordering::SeqCst);
            store
        }
    }

    impl LedgerStore for FaultStore {
        fn insert_item(&self, item: InventoryItem) -> Result<(), StoreError> {
            self.inner.insert_item(item)
        }

        fn load_item(&self, id: ItemId) -> Result<InventoryItem, StoreError> {
            self.inner.load_item(id)
        }

        fn update_item(
            &self,
            item: InventoryItem,
            expected: ExpectedVersion,
        ) -> Result<u64, StoreError> {
            if self
                .item_write_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Conflict("injected".to_string()));
            }
            self.inner.update_item(item, expected)
        }

        fn insert_task(&self, task: MaintenanceTask) -> Result<(), StoreError> {
            if self.fail_insert_task.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("injected".to_string()));
            }
            self.inner.insert_task(task)
        }

        fn load_task(&self, id: MaintenanceTaskId) -> Result<MaintenanceTask, StoreError> {
            self.inner.load_task(id)
        }

        fn update_task(
            &self,
            task: MaintenanceTask,
            expected: ExpectedVersion,
        ) -> Result<u64, StoreError> {
            if self.stall_next_task_write.swap(false, Ordering::SeqCst) {
                self.parked.wait();
                self.resume.wait();
            }
            self.inner.update_task(task, expected)
        }

        fn append_disposal(&self, tx: DisposalTransaction) -> Result<(), StoreError> {
            if self.fail_append_disposal.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("injected".to_string()));
            }
            self.inner.append_disposal(tx)
        }

        fn update_disposal(&self, tx: DisposalTransaction) -> Result<(), StoreError> {
            self.inner.update_disposal(tx)
        }

        fn disposals_for_item(&self, id: ItemId) -> Result<Vec<DisposalTransaction>, StoreError> {
            self.inner.disposals_for_item(id)
        }

        fn insert_borrowing(&self, record: BorrowingRecord) -> Result<(), StoreError> {
            self.inner.insert_borrowing(record)
        }

        fn load_borrowing(&self, id: BorrowingId) -> Result<BorrowingRecord, StoreError> {
            self.inner.load_borrowing(id)
        }

        fn update_borrowing(
            &self,
            record: BorrowingRecord,
            expected: ExpectedVersion,
        ) -> Result<u64, StoreError> {
            self.inner.update_borrowing(record, expected)
        }
    }

    #[test]
    fn transient_conflicts_are_retried() {
        let engine = AllocationEngine::new(FaultStore::with_item_write_conflicts(2));
        let item_id = register(&engine, ItemCategory::Equipment, 5);

        // Two injected conflicts, third attempt lands.
        engine.reserve_for_borrow(item_id, 1).unwrap();
        assert_eq!(engine.quantity_breakdown(item_id).unwrap().borrowed, 1);
    }

    #[test]
    fn retry_exhaustion_surfaces_concurrent_modification() {
        let engine = AllocationEngine::new(FaultStore::with_item_write_conflicts(u32::MAX));
        let item_id = register(&engine, ItemCategory::Equipment, 5);

        let err = engine.reserve_for_borrow(item_id, 1).unwrap_err();
        assert!(matches!(err, LedgerError::ConcurrentModification(_)));
    }

    #[test]
    fn concurrent_progress_recorders_release_each_delta_once() {
        let engine = Arc::new(AllocationEngine::new(FaultStore::new()));
        let item_id = register(engine.as_ref(), ItemCategory::Equipment, 10);
        let task_id = engine
            .reserve_for_maintenance(item_id, 4, due_in_a_week())
            .unwrap()
            .id_typed();

        engine
            .store()
            .stall_next_task_write
            .store(true, Ordering::SeqCst);
        let slow = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.record_maintenance_progress(task_id, 3))
        };

        // The slow recorder is now parked before its conditional task write,
        // holding a basis of zero units maintained. Record two units under it.
        engine.store().parked.wait();
        let fast = engine.record_maintenance_progress(task_id, 2).unwrap();
        assert_eq!(fast.maintained_quantity(), 2);

        engine.store().resume.wait();
        let slow = slow.join().unwrap().unwrap();

        // The parked write fails its version check, retries against the
        // fresh total, and releases only its one-unit delta.
        assert_eq!(slow.maintained_quantity(), 3);
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.maintenance), (9, 1));
        assert_conserved(engine.as_ref(), item_id);
    }

    #[test]
    fn concurrent_approvals_reserve_only_one_unit() {
        let engine = Arc::new(AllocationEngine::new(InMemoryLedgerStore::new()));
        let item_id = register(engine.as_ref(), ItemCategory::Equipment, 3);
        let borrowing_id = engine.request_borrow(item_id).unwrap().id_typed();

        let barrier = Arc::new(Barrier::new(2));
        let (first, second) = std::thread::scope(|scope| {
            let spawn_approval = || {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                scope.spawn(move || {
                    barrier.wait();
                    engine.approve_borrow(borrowing_id, due_in_a_week())
                })
            };
            let a = spawn_approval();
            let b = spawn_approval();
            (a.join().unwrap(), b.join().unwrap())
        });

        let successes = [first.is_ok(), second.is_ok()]
            .iter()
            .filter(|ok| **ok)
            .count();
        assert_eq!(successes, 1, "exactly one approval must win");
        for res in [&first, &second] {
            if let Err(err) = res {
                assert!(
                    matches!(
                        err,
                        LedgerError::Conflict(_) | LedgerError::ConcurrentModification(_)
                    ),
                    "unexpected loser error: {err:?}"
                );
            }
        }

        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.borrowed), (2, 1));
        assert_conserved(engine.as_ref(), item_id);
    }

    #[test]
    fn failed_task_insert_releases_the_reservation() {
        let engine = AllocationEngine::new(FaultStore::new());
        let item_id = register(&engine, ItemCategory::Equipment, 10);
        engine
            .store()
            .fail_insert_task
            .store(true, Ordering::SeqCst);

        engine
            .reserve_for_maintenance(item_id, 4, due_in_a_week())
            .unwrap_err();
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.maintenance), (10, 0));
        assert_conserved(&engine, item_id);
    }

    #[test]
    fn failed_disposal_append_moves_no_units() {
        let engine = AllocationEngine::new(FaultStore::new());
        let item_id = register(&engine, ItemCategory::Consumables, 10);
        engine
            .store()
            .fail_append_disposal
            .store(true, Ordering::SeqCst);

        engine.dispose_units(item_id, 3, "expired").unwrap_err();
        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.disposed), (10, 0));
        assert!(engine.disposal_history(item_id).unwrap().is_empty());
    }

    #[test]
    fn losing_disposal_leaves_a_cancelled_record() {
        let engine = AllocationEngine::new(FaultStore::with_item_write_conflicts(u32::MAX));
        let item_id = register(&engine, ItemCategory::Consumables, 10);

        let err = engine.dispose_units(item_id, 3, "expired").unwrap_err();
        assert!(matches!(err, LedgerError::ConcurrentModification(_)));

        let b = engine.quantity_breakdown(item_id).unwrap();
        assert_eq!((b.available, b.disposed), (10, 0));
        let history = engine.disposal_history(item_id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status(), DisposalStatus::Cancelled);
    }
}
