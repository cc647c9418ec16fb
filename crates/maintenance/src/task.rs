use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labstock_core::{LedgerError, LedgerResult, RecordId, VersionedRecord};
use labstock_inventory::ItemId;

/// Maintenance task identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaintenanceTaskId(pub RecordId);

impl MaintenanceTaskId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MaintenanceTaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Maintenance task lifecycle.
///
/// `Overdue` is never persisted; it is derived from the due date by
/// [`MaintenanceTask::effective_status`]. The stored status and the
/// reconciled quantities must never disagree: `Completed` is reachable only
/// through full quantity reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Scheduled,
    InProgress,
    Completed,
    Overdue,
    Cancelled,
}

/// Progress snapshot for display surfaces (progress bars).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceProgress {
    pub quantity: u32,
    pub maintained: u32,
    pub remaining: u32,
    pub status: TaskStatus,
}

/// A maintenance task holding a reserved sub-quantity of one item.
///
/// The task is the append-only justification for why units left the item's
/// `available` bucket; the owning item remains the source of truth for the
/// aggregate quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceTask {
    id: MaintenanceTaskId,
    item_id: ItemId,
    /// Units reserved for this task on the owning item.
    quantity: u32,
    /// Units completed so far, monotonically non-decreasing.
    maintained_quantity: u32,
    status: TaskStatus,
    due_date: DateTime<Utc>,
    scheduled_at: DateTime<Utc>,
    version: u64,
}

impl MaintenanceTask {
    /// Schedule maintenance for `quantity` units of an item.
    pub fn schedule(
        id: MaintenanceTaskId,
        item_id: ItemId,
        quantity: u32,
        due_date: DateTime<Utc>,
        scheduled_at: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        if quantity == 0 {
            return Err(LedgerError::invalid_quantity("quantity must be at least 1"));
        }
        Ok(Self {
            id,
            item_id,
            quantity,
            maintained_quantity: 0,
            status: TaskStatus::Scheduled,
            due_date,
            scheduled_at,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> MaintenanceTaskId {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn maintained_quantity(&self) -> u32 {
        self.maintained_quantity
    }

    pub fn remaining_quantity(&self) -> u32 {
        self.quantity - self.maintained_quantity
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn due_date(&self) -> DateTime<Utc> {
        self.due_date
    }

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_terminal() && self.due_date < now
    }

    /// Stored status with the overdue derivation applied.
    pub fn effective_status(&self, now: DateTime<Utc>) -> TaskStatus {
        if self.is_overdue(now) {
            TaskStatus::Overdue
        } else {
            self.status
        }
    }

    pub fn progress(&self) -> MaintenanceProgress {
        MaintenanceProgress {
            quantity: self.quantity,
            maintained: self.maintained_quantity,
            remaining: self.remaining_quantity(),
            status: self.status,
        }
    }

    /// Record cumulative completed units.
    ///
    /// `maintained_qty` is the new total, not a delta; it must be
    /// non-decreasing and at most the reserved quantity. Returns the delta of
    /// units to release back to the owning item's `available` bucket.
    /// Reaching the full reserved quantity is what transitions the task to
    /// `Completed`; repeating the same total is a no-op (delta 0).
    pub fn record_progress(&mut self, maintained_qty: u32) -> LedgerResult<u32> {
        if self.status == TaskStatus::Cancelled {
            return Err(LedgerError::conflict(
                "cannot record progress on a cancelled task",
            ));
        }
        if maintained_qty > self.quantity {
            return Err(LedgerError::invalid_quantity(format!(
                "maintained quantity {maintained_qty} exceeds reserved quantity {}",
                self.quantity
            )));
        }
        if maintained_qty < self.maintained_quantity {
            return Err(LedgerError::validation(format!(
                "maintained quantity must be non-decreasing ({} -> {maintained_qty})",
                self.maintained_quantity
            )));
        }

        let delta = maintained_qty - self.maintained_quantity;
        self.maintained_quantity = maintained_qty;

        if self.maintained_quantity == self.quantity {
            self.status = TaskStatus::Completed;
        } else if self.maintained_quantity > 0 {
            self.status = TaskStatus::InProgress;
        }

        Ok(delta)
    }

    /// Conformance check for out-of-band status updates claiming completion.
    ///
    /// Status and quantities must never disagree, so a `Completed` claim is
    /// rejected unless the quantities already reconcile.
    pub fn mark_completed(&mut self) -> LedgerResult<()> {
        if self.status == TaskStatus::Cancelled {
            return Err(LedgerError::conflict("task is cancelled"));
        }
        if self.maintained_quantity != self.quantity {
            return Err(LedgerError::conflict(format!(
                "cannot mark task completed: {} of {} units maintained",
                self.maintained_quantity, self.quantity
            )));
        }
        self.status = TaskStatus::Completed;
        Ok(())
    }

    /// Cancel the task.
    ///
    /// Terminal; returns the unreconciled remainder, which the caller must
    /// release back to the owning item. Reserved units are never silently
    /// lost.
    pub fn cancel(&mut self) -> LedgerResult<u32> {
        if self.is_terminal() {
            return Err(LedgerError::conflict(format!(
                "cannot cancel a task in status {:?}",
                self.status
            )));
        }
        let remainder = self.remaining_quantity();
        self.status = TaskStatus::Cancelled;
        Ok(remainder)
    }
}

impl VersionedRecord for MaintenanceTask {
    type Id = MaintenanceTaskId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl MaintenanceTask {
    /// Set the persisted version. Store-layer use only.
    #[doc(hidden)]
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
