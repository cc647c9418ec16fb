//! Item categories and the disposal-eligibility capability.

use serde::{Deserialize, Serialize};

/// Closed set of laboratory item categories.
///
/// Eligibility rules branch on the category in exactly one place: the
/// capability methods below. Call sites must never compare category names
/// as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Consumables,
    Liquids,
    Equipment,
    Glassware,
    Instruments,
}

impl ItemCategory {
    /// Whether units of this category may be permanently removed through the
    /// disposal workflow.
    ///
    /// Only consumable/perishable categories are disposed here; durable
    /// equipment follows a separate decommissioning path.
    pub fn disposal_eligible(self) -> bool {
        matches!(self, ItemCategory::Consumables | ItemCategory::Liquids)
    }

    pub fn name(self) -> &'static str {
        match self {
            ItemCategory::Consumables => "Consumables",
            ItemCategory::Liquids => "Liquids",
            ItemCategory::Equipment => "Equipment",
            ItemCategory::Glassware => "Glassware",
            ItemCategory::Instruments => "Instruments",
        }
    }
}

impl core::fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
