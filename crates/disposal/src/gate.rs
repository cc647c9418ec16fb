//! Disposal policy check.

use labstock_core::{LedgerError, LedgerResult};
use labstock_inventory::InventoryItem;

/// Policy gate consulted before any disposal mutates state.
///
/// Category eligibility is decided by the category's capability flag, in one
/// place; availability is checked against the live record so the gate rejects
/// before the allocation engine ever computes a post-state.
pub struct DisposalGate;

impl DisposalGate {
    /// Check whether `qty` units of `item` may be disposed right now.
    pub fn check(item: &InventoryItem, qty: u32) -> LedgerResult<()> {
        if !item.category().disposal_eligible() {
            return Err(LedgerError::CategoryNotDisposable(
                item.category().name().to_string(),
            ));
        }
        if qty == 0 {
            return Err(LedgerError::invalid_quantity("quantity must be at least 1"));
        }
        if qty > item.available_quantity() {
            return Err(LedgerError::insufficient(qty, item.available_quantity()));
        }
        Ok(())
    }
}
