use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labstock_core::{LedgerError, LedgerResult, RecordId, VersionedRecord};
use labstock_inventory::ItemId;

/// Borrowing record identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BorrowingId(pub RecordId);

impl BorrowingId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BorrowingId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Borrowing workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Pending,
    Approved,
    Rejected,
    Released,
    Returned,
    Overdue,
}

/// One-unit loan record for an inventory item.
///
/// The record justifies one unit of the item's `borrowed` bucket while it is
/// active; approval and return are the points at which the allocation engine
/// moves the unit between `available` and `borrowed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowingRecord {
    id: BorrowingId,
    item_id: ItemId,
    status: BorrowStatus,
    requested_at: DateTime<Utc>,
    /// Agreed return date, once the request is approved.
    return_date: Option<DateTime<Utc>>,
    version: u64,
}

impl BorrowingRecord {
    pub fn request(id: BorrowingId, item_id: ItemId, requested_at: DateTime<Utc>) -> Self {
        Self {
            id,
            item_id,
            status: BorrowStatus::Pending,
            requested_at,
            return_date: None,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> BorrowingId {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn status(&self) -> BorrowStatus {
        self.status
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    pub fn return_date(&self) -> Option<DateTime<Utc>> {
        self.return_date
    }

    /// Whether this record currently accounts for one borrowed unit.
    pub fn is_currently_borrowed(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            BorrowStatus::Pending | BorrowStatus::Approved | BorrowStatus::Released
        ) && self.return_date.is_none_or(|d| d >= now)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            BorrowStatus::Approved | BorrowStatus::Released | BorrowStatus::Overdue
        ) && self.return_date.is_some_and(|d| d < now)
    }

    pub fn approve(&mut self, return_date: DateTime<Utc>) -> LedgerResult<()> {
        if self.status != BorrowStatus::Pending {
            return Err(LedgerError::conflict(format!(
                "cannot approve a request in status {:?}",
                self.status
            )));
        }
        self.status = BorrowStatus::Approved;
        self.return_date = Some(return_date);
        Ok(())
    }

    pub fn reject(&mut self) -> LedgerResult<()> {
        if self.status != BorrowStatus::Pending {
            return Err(LedgerError::conflict(format!(
                "cannot reject a request in status {:?}",
                self.status
            )));
        }
        self.status = BorrowStatus::Rejected;
        Ok(())
    }

    /// Record the physical hand-out of the approved unit.
    pub fn release(&mut self) -> LedgerResult<()> {
        if self.status != BorrowStatus::Approved {
            return Err(LedgerError::conflict(format!(
                "cannot release a request in status {:?}",
                self.status
            )));
        }
        self.status = BorrowStatus::Released;
        Ok(())
    }

    pub fn mark_returned(&mut self) -> LedgerResult<()> {
        if !matches!(
            self.status,
            BorrowStatus::Approved | BorrowStatus::Released | BorrowStatus::Overdue
        ) {
            return Err(LedgerError::conflict(format!(
                "cannot return a request in status {:?}",
                self.status
            )));
        }
        self.status = BorrowStatus::Returned;
        Ok(())
    }

    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> LedgerResult<()> {
        if !self.is_overdue(now) {
            return Err(LedgerError::conflict("return date has not passed"));
        }
        self.status = BorrowStatus::Overdue;
        Ok(())
    }

    #[doc(hidden)]
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl VersionedRecord for BorrowingRecord {
    type Id = BorrowingId;

    fn id(&self) -> &BorrowingId {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
