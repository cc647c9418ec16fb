//! Borrowing eligibility evaluation.
//!
//! Pure predicate over the quantity record, with per-rule refusal reasons so
//! display surfaces can render accurate badges. The engine re-runs this
//! evaluation at reservation time; badge-side evaluations are advisory only.

use serde::{Deserialize, Serialize};

use crate::item::{InventoryItem, ItemCondition, ItemStatus, MaintenanceNeeds};

/// One rule that currently blocks borrowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowRefusal {
    /// Admin set `can_be_borrowed` to `false`.
    AdminOverride,
    /// Condition is outside {Excellent, Good, Fair}.
    UnacceptableCondition(ItemCondition),
    /// Item is flagged as needing maintenance.
    MaintenanceRequired,
    /// Item status is not Active.
    ItemNotActive(ItemStatus),
    /// No units are currently free.
    NoAvailableUnits,
}

impl core::fmt::Display for BorrowRefusal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BorrowRefusal::AdminOverride => f.write_str("borrowing disabled by admin"),
            BorrowRefusal::UnacceptableCondition(c) => {
                write!(f, "condition {c:?} is not acceptable")
            }
            BorrowRefusal::MaintenanceRequired => f.write_str("item needs maintenance"),
            BorrowRefusal::ItemNotActive(s) => write!(f, "item status is {s:?}"),
            BorrowRefusal::NoAvailableUnits => f.write_str("no units available"),
        }
    }
}

/// Result of a borrowing eligibility evaluation.
///
/// Borrowable when no rule refuses; otherwise every violated rule is listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrowability {
    refusals: Vec<BorrowRefusal>,
}

impl Borrowability {
    /// Evaluate all borrowing rules against the current record state.
    pub fn evaluate(item: &InventoryItem) -> Self {
        let mut refusals = Vec::new();

        if item.can_be_borrowed() == Some(false) {
            refusals.push(BorrowRefusal::AdminOverride);
        }
        if !item.condition().acceptable_for_borrowing() {
            refusals.push(BorrowRefusal::UnacceptableCondition(item.condition()));
        }
        if item.maintenance_needs() != MaintenanceNeeds::No {
            refusals.push(BorrowRefusal::MaintenanceRequired);
        }
        if item.status() != ItemStatus::Active {
            refusals.push(BorrowRefusal::ItemNotActive(item.status()));
        }
        if item.available_quantity() == 0 {
            refusals.push(BorrowRefusal::NoAvailableUnits);
        }

        Self { refusals }
    }

    pub fn is_borrowable(&self) -> bool {
        self.refusals.is_empty()
    }

    pub fn refusals(&self) -> &[BorrowRefusal] {
        &self.refusals
    }
}

impl core::fmt::Display for Borrowability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.refusals.is_empty() {
            return f.write_str("borrowable");
        }
        for (idx, refusal) in self.refusals.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            core::fmt::Display::fmt(refusal, f)?;
        }
        Ok(())
    }
}
