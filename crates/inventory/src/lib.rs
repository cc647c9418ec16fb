//! Inventory domain module (quantity ledger).
//!
//! This crate contains the business rules for one inventory item's quantity
//! breakdown, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage).

pub mod category;
pub mod eligibility;
pub mod item;

pub use category::ItemCategory;
pub use eligibility::{BorrowRefusal, Borrowability};
pub use item::{
    CalibrationState, InventoryItem, ItemCondition, ItemId, ItemStatus, MaintenanceNeeds,
    QuantityBreakdown,
};
