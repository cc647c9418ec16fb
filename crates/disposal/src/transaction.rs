use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labstock_core::{LedgerError, LedgerResult, RecordId};
use labstock_inventory::ItemId;

/// Disposal transaction identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisposalId(pub RecordId);

impl DisposalId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DisposalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Disposal transaction lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisposalStatus {
    Pending,
    Completed,
    Cancelled,
}

/// Record of one permanent removal of units from an item.
///
/// Transactions are the append-only justification for the item's `disposed`
/// bucket; the item record remains the source of truth for the aggregate
/// quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposalTransaction {
    id: DisposalId,
    item_id: ItemId,
    disposal_quantity: u32,
    reason: String,
    status: DisposalStatus,
    recorded_at: DateTime<Utc>,
}

impl DisposalTransaction {
    pub fn new(
        id: DisposalId,
        item_id: ItemId,
        disposal_quantity: u32,
        reason: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        if disposal_quantity == 0 {
            return Err(LedgerError::invalid_quantity(
                "disposal quantity must be at least 1",
            ));
        }
        Ok(Self {
            id,
            item_id,
            disposal_quantity,
            reason: reason.into(),
            status: DisposalStatus::Pending,
            recorded_at,
        })
    }

    pub fn id_typed(&self) -> DisposalId {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn disposal_quantity(&self) -> u32 {
        self.disposal_quantity
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn status(&self) -> DisposalStatus {
        self.status
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Mark the units as permanently removed.
    pub fn complete(&mut self) -> LedgerResult<()> {
        if self.status != DisposalStatus::Pending {
            return Err(LedgerError::conflict(format!(
                "cannot complete a disposal in status {:?}",
                self.status
            )));
        }
        self.status = DisposalStatus::Completed;
        Ok(())
    }

    /// Abandon a pending disposal before any units were removed.
    pub fn cancel(&mut self) -> LedgerResult<()> {
        if self.status != DisposalStatus::Pending {
            return Err(LedgerError::conflict(format!(
                "cannot cancel a disposal in status {:?}",
                self.status
            )));
        }
        self.status = DisposalStatus::Cancelled;
        Ok(())
    }
}
