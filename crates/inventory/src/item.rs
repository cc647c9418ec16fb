use serde::{Deserialize, Serialize};

use labstock_core::{LedgerError, LedgerResult, RecordId, VersionedRecord};

use crate::category::ItemCategory;
use crate::eligibility::Borrowability;

/// Inventory item identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub RecordId);

impl ItemId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Physical condition of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    Excellent,
    Good,
    Fair,
    Poor,
    UnderMaintenance,
}

impl ItemCondition {
    /// Conditions in which units may still be handed out to borrowers.
    pub fn acceptable_for_borrowing(self) -> bool {
        matches!(
            self,
            ItemCondition::Excellent | ItemCondition::Good | ItemCondition::Fair
        )
    }
}

/// Whether an item is flagged as needing maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceNeeds {
    No,
    Yes,
}

/// Calibration state, carried on the record for display/reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationState {
    NotRequired,
    Calibrated,
    Due,
}

/// Administrative status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Active,
    Inactive,
    Retired,
}

/// Read-only snapshot of an item's quantity buckets, for display surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityBreakdown {
    pub quantity: u32,
    pub available: u32,
    pub borrowed: u32,
    pub maintenance: u32,
    pub disposed: u32,
}

/// The persisted quantity record for one inventory item.
///
/// This is the single source of truth for the item's aggregate quantities.
/// The quantity buckets obey the conservation law
///
/// ```text
/// available + borrowed + maintenance + disposed == quantity
/// ```
///
/// after every mutation, where `quantity` counts all units the item has ever
/// owned (net of explicit admin adjustments). Disposed units stay in the
/// `disposed` bucket permanently; the current in-service total is the derived
/// [`InventoryItem::in_service_quantity`], which shrinks when units are
/// disposed.
///
/// All quantity mutation goes through the methods below; calling surfaces
/// must never compute and persist bucket deltas themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: ItemId,
    name: String,
    category: ItemCategory,
    condition: ItemCondition,
    maintenance_needs: MaintenanceNeeds,
    calibration: CalibrationState,
    status: ItemStatus,
    /// Explicit admin override for borrowing; `None` means unset.
    can_be_borrowed: Option<bool>,
    quantity: u32,
    available_quantity: u32,
    borrowed_quantity: u32,
    maintenance_quantity: u32,
    disposal_quantity: u32,
    version: u64,
}

impl InventoryItem {
    /// Register a new item with all units available.
    pub fn new(
        id: ItemId,
        name: impl Into<String>,
        category: ItemCategory,
        quantity: u32,
    ) -> LedgerResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LedgerError::validation("name cannot be empty"));
        }
        if quantity == 0 {
            return Err(LedgerError::invalid_quantity("quantity must be at least 1"));
        }
        Ok(Self {
            id,
            name,
            category,
            condition: ItemCondition::Good,
            maintenance_needs: MaintenanceNeeds::No,
            calibration: CalibrationState::NotRequired,
            status: ItemStatus::Active,
            can_be_borrowed: None,
            quantity,
            available_quantity: quantity,
            borrowed_quantity: 0,
            maintenance_quantity: 0,
            disposal_quantity: 0,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> ItemCategory {
        self.category
    }

    pub fn condition(&self) -> ItemCondition {
        self.condition
    }

    pub fn maintenance_needs(&self) -> MaintenanceNeeds {
        self.maintenance_needs
    }

    pub fn calibration(&self) -> CalibrationState {
        self.calibration
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn can_be_borrowed(&self) -> Option<bool> {
        self.can_be_borrowed
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn available_quantity(&self) -> u32 {
        self.available_quantity
    }

    pub fn borrowed_quantity(&self) -> u32 {
        self.borrowed_quantity
    }

    pub fn maintenance_quantity(&self) -> u32 {
        self.maintenance_quantity
    }

    pub fn disposal_quantity(&self) -> u32 {
        self.disposal_quantity
    }

    /// Units still in service: total minus permanently disposed units.
    pub fn in_service_quantity(&self) -> u32 {
        self.quantity - self.disposal_quantity
    }

    pub fn breakdown(&self) -> QuantityBreakdown {
        QuantityBreakdown {
            quantity: self.quantity,
            available: self.available_quantity,
            borrowed: self.borrowed_quantity,
            maintenance: self.maintenance_quantity,
            disposed: self.disposal_quantity,
        }
    }

    /// Evaluate borrowing eligibility against the current record state.
    pub fn borrowability(&self) -> Borrowability {
        Borrowability::evaluate(self)
    }

    // Categorical state is edited directly by admin surfaces; only quantity
    // buckets are restricted to the allocation methods below.

    pub fn set_condition(&mut self, condition: ItemCondition) {
        self.condition = condition;
    }

    pub fn set_maintenance_needs(&mut self, needs: MaintenanceNeeds) {
        self.maintenance_needs = needs;
    }

    pub fn set_calibration(&mut self, calibration: CalibrationState) {
        self.calibration = calibration;
    }

    pub fn set_status(&mut self, status: ItemStatus) {
        self.status = status;
    }

    pub fn set_can_be_borrowed(&mut self, override_flag: Option<bool>) {
        self.can_be_borrowed = override_flag;
    }

    fn allocated(&self) -> u32 {
        self.borrowed_quantity + self.maintenance_quantity + self.disposal_quantity
    }

    /// Defensive post-state check for the conservation law.
    ///
    /// Validation in each mutator should make this unreachable; if it fires,
    /// the computed state must not be persisted.
    pub fn check_conservation(&self) -> LedgerResult<()> {
        let sum = self
            .available_quantity
            .checked_add(self.borrowed_quantity)
            .and_then(|s| s.checked_add(self.maintenance_quantity))
            .and_then(|s| s.checked_add(self.disposal_quantity));
        match sum {
            Some(total) if total == self.quantity => Ok(()),
            _ => Err(LedgerError::invariant(format!(
                "conservation law broken on item {}: {} + {} + {} + {} != {}",
                self.id,
                self.available_quantity,
                self.borrowed_quantity,
                self.maintenance_quantity,
                self.disposal_quantity,
                self.quantity
            ))),
        }
    }

    fn take_available(&mut self, qty: u32) -> LedgerResult<()> {
        if qty == 0 {
            return Err(LedgerError::invalid_quantity("quantity must be at least 1"));
        }
        if qty > self.available_quantity {
            return Err(LedgerError::insufficient(qty, self.available_quantity));
        }
        self.available_quantity -= qty;
        Ok(())
    }

    /// Move units from `available` into the maintenance reservation.
    pub fn reserve_for_maintenance(&mut self, qty: u32) -> LedgerResult<()> {
        self.take_available(qty)?;
        self.maintenance_quantity += qty;
        self.check_conservation()
    }

    /// Return previously reserved maintenance units to `available`.
    ///
    /// Used both for recorded progress and for cancellation; maintenance
    /// restores availability, it never destroys units.
    pub fn release_from_maintenance(&mut self, qty: u32) -> LedgerResult<()> {
        if qty == 0 {
            return Ok(());
        }
        if qty > self.maintenance_quantity {
            return Err(LedgerError::invariant(format!(
                "release of {qty} exceeds reserved maintenance units ({})",
                self.maintenance_quantity
            )));
        }
        self.maintenance_quantity -= qty;
        self.available_quantity += qty;
        self.check_conservation()
    }

    /// Permanently remove units through disposal.
    ///
    /// Disposal draws only from available stock, never from borrowed or
    /// in-maintenance units, and is restricted to disposal-eligible
    /// categories.
    pub fn dispose(&mut self, qty: u32) -> LedgerResult<()> {
        if !self.category.disposal_eligible() {
            return Err(LedgerError::CategoryNotDisposable(
                self.category.name().to_string(),
            ));
        }
        self.take_available(qty)?;
        self.disposal_quantity += qty;
        self.check_conservation()
    }

    /// Move units from `available` to `borrowed`.
    ///
    /// Eligibility is re-evaluated here, at reservation time; a cached
    /// evaluation at the calling surface is never authoritative.
    pub fn reserve_for_borrow(&mut self, qty: u32) -> LedgerResult<()> {
        if qty == 0 {
            return Err(LedgerError::invalid_quantity("quantity must be at least 1"));
        }
        if qty > self.available_quantity {
            return Err(LedgerError::insufficient(qty, self.available_quantity));
        }
        let eligibility = self.borrowability();
        if !eligibility.is_borrowable() {
            return Err(LedgerError::validation(format!(
                "item is not borrowable: {eligibility}"
            )));
        }
        self.available_quantity -= qty;
        self.borrowed_quantity += qty;
        self.check_conservation()
    }

    /// Return borrowed units to `available`.
    pub fn release_from_borrow(&mut self, qty: u32) -> LedgerResult<()> {
        if qty == 0 {
            return Err(LedgerError::invalid_quantity("quantity must be at least 1"));
        }
        if qty > self.borrowed_quantity {
            return Err(LedgerError::invariant(format!(
                "release of {qty} exceeds borrowed units ({})",
                self.borrowed_quantity
            )));
        }
        self.borrowed_quantity -= qty;
        self.available_quantity += qty;
        self.check_conservation()
    }

    /// Administrative edit of the total quantity.
    ///
    /// The total can never shrink below the units already allocated to
    /// borrowing, maintenance, or disposal; `available` is re-derived from
    /// the new total rather than edited directly.
    pub fn adjust_total(&mut self, new_quantity: u32) -> LedgerResult<()> {
        if new_quantity == 0 {
            return Err(LedgerError::invalid_quantity("quantity must be at least 1"));
        }
        let allocated = self.allocated();
        if new_quantity < allocated {
            return Err(LedgerError::validation(format!(
                "cannot shrink total to {new_quantity}: {allocated} units are already allocated"
            )));
        }
        self.quantity = new_quantity;
        self.available_quantity = new_quantity - allocated;
        self.check_conservation()
    }
}

impl VersionedRecord for InventoryItem {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl InventoryItem {
    /// Set the persisted version. Store-layer use only.
    #[doc(hidden)]
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
