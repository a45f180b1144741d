//! Inventory item model and item code generation.
//!
//! Field names are canonical snake_case. Any other naming a client expects is a
//! serialization-boundary concern and never reaches the engine.

use crate::food::ExpirationStatus;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Store-assigned identifier of an inventory row.
pub type ItemId = u64;

/// Prefix of generated item codes.
pub const ITEM_CODE_PREFIX: &str = "FT";

/// A registered inventory item.
///
/// `expiration_date` and `status` are derived values, recomputed in place by the
/// expiration engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Store-assigned row id.
    pub id: ItemId,
    /// Unique generated code (`FT-YYMM-NNNN`).
    pub code: String,
    /// Food type this item belongs to.
    pub food_type_code: String,
    /// Product name.
    pub name: String,
    /// Amount on hand.
    pub quantity: f64,
    /// Unit of `quantity` (kg, l, units...).
    pub quantity_unit: String,
    /// Supplier batch number.
    pub batch_number: String,
    /// Manufacturing date printed on the product.
    pub manufacturing_date: NaiveDate,
    /// Date the item entered cold storage.
    pub entry_date: NaiveDate,
    /// Derived: `entry_date` + temperature-adjusted shelf life.
    pub expiration_date: NaiveDate,
    /// Derived: classification of `expiration_date`.
    pub status: ExpirationStatus,
    /// Shelf/room where the item is stored.
    pub storage_location: String,
}

/// Registration request for a new item, before derived fields exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInventoryItem {
    /// Food type code; must resolve to a policy.
    pub food_type_code: String,
    /// Product name.
    pub name: String,
    /// Amount on hand.
    pub quantity: f64,
    /// Unit of `quantity`.
    pub quantity_unit: String,
    /// Supplier batch number.
    pub batch_number: String,
    /// Manufacturing date.
    pub manufacturing_date: NaiveDate,
    /// Date of entry into storage.
    pub entry_date: NaiveDate,
    /// Storage location.
    pub storage_location: String,
}

impl NewInventoryItem {
    /// Attach the derived fields and store-assigned identity.
    pub fn into_item(
        self,
        id: ItemId,
        code: String,
        expiration_date: NaiveDate,
        status: ExpirationStatus,
    ) -> InventoryItem {
        InventoryItem {
            id,
            code,
            food_type_code: self.food_type_code,
            name: self.name,
            quantity: self.quantity,
            quantity_unit: self.quantity_unit,
            batch_number: self.batch_number,
            manufacturing_date: self.manufacturing_date,
            entry_date: self.entry_date,
            expiration_date,
            status,
            storage_location: self.storage_location,
        }
    }
}

/// Month prefix for codes generated on `today`, e.g. `FT-2401-`.
pub fn month_prefix(today: NaiveDate) -> String {
    format!(
        "{}-{:02}{:02}-",
        ITEM_CODE_PREFIX,
        today.year().rem_euclid(100),
        today.month()
    )
}

/// Generate the next unique item code.
///
/// `last_code` is the highest code already issued for the current month, if any.
/// The sequence restarts at `0001` every month and whenever the last code does not
/// carry a parseable sequence number.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use freshtrack_core::next_item_code;
///
/// let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// assert_eq!(next_item_code(today, None), "FT-2401-0001");
/// assert_eq!(next_item_code(today, Some("FT-2401-0041")), "FT-2401-0042");
/// ```
pub fn next_item_code(today: NaiveDate, last_code: Option<&str>) -> String {
    let prefix = month_prefix(today);
    let last_number = last_code
        .and_then(|code| code.strip_prefix(prefix.as_str()))
        .and_then(|sequence| sequence.parse::<u32>().ok())
        .unwrap_or(0);
    format!("{}{:04}", prefix, last_number + 1)
}
