//! # FreshTrack Core
//!
//! Shared domain types and traits for the `freshtrack` food-inventory tracker.
//! Everything in this crate is either plain data, a pure function, or a trait
//! describing an external collaborator. Background tasks live in the root crate.
//!
//! ## Crate Structure
//!
//! - **`food`**: `FoodTypePolicy`, `TemperatureThresholds` and the tri-state
//!   `ExpirationStatus`.
//! - **`inventory`**: `InventoryItem`, `NewInventoryItem` and item code generation.
//! - **`sample`**: `TemperatureSample`, range validation and the `LatestSample`
//!   single-writer cell.
//! - **`alert`**: temperature alert classification for notification collaborators.
//! - **`error`**: the `FreshError` enum shared by every crate in the workspace.
//! - **`retry`**: `RetryPolicy` consumed by the acquisition state machine.
//! - **`store`**: traits for the policy, inventory, temperature log and settings stores.
//! - **`link`**: the line-oriented hardware link abstraction.
//! - **`serial`**: async serial port opening (requires the `serial` feature).
//! - **`clock`**: injectable calendar source.

pub mod alert;
pub mod clock;
pub mod error;
pub mod food;
pub mod inventory;
pub mod limits;
pub mod link;
pub mod retry;
pub mod sample;
pub mod store;

#[cfg(feature = "serial")]
pub mod serial;

pub use alert::{check_temperature_alert, AlertLevel, AlertThresholds};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AppResult, FaultKind, FreshError};
pub use food::{ExpirationStatus, FoodTypePolicy, TemperatureThresholds};
pub use inventory::{next_item_code, InventoryItem, ItemId, NewInventoryItem};
pub use link::{LineSource, LinkOpener, ReaderLineSource};
pub use retry::{BackoffSchedule, RetryPolicy};
pub use sample::{LatestSample, SampleSource, TemperatureSample};
pub use store::{
    settings_keys, ClimateAverage, InventoryStore, PolicyStore, SettingsStore,
    TemperatureLogStore,
};
