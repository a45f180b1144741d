//! Contracts with the persistence collaborators.
//!
//! The core never owns a database. Every store is reached through one of these
//! traits; errors they return propagate unmodified.

use crate::error::AppResult;
use crate::food::{ExpirationStatus, FoodTypePolicy, TemperatureThresholds};
use crate::inventory::{InventoryItem, ItemId, NewInventoryItem};
use crate::sample::TemperatureSample;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Keys understood by the [`SettingsStore`].
pub mod settings_keys {
    /// `"true"` / `"false"`: whether acquisition runs on the simulator.
    pub const SIMULATION_MODE: &str = "simulation_mode";
    /// Device path of the hardware link.
    pub const SERIAL_PORT: &str = "serial_port";
    /// Warning window in days.
    pub const WARNING_DAYS: &str = "warning_days";
    /// High temperature threshold in °C.
    pub const TEMPERATURE_THRESHOLD_HIGH: &str = "temperature_threshold_high";
    /// Medium temperature threshold in °C.
    pub const TEMPERATURE_THRESHOLD_MEDIUM: &str = "temperature_threshold_medium";
}

/// Read-only access to food-type policies and thresholds.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Look up one policy by code.
    async fn get_policy(&self, type_code: &str) -> AppResult<Option<FoodTypePolicy>>;

    /// All known policies.
    async fn list_policies(&self) -> AppResult<Vec<FoodTypePolicy>>;

    /// Current process-wide thresholds.
    async fn get_thresholds(&self) -> AppResult<TemperatureThresholds>;
}

/// Inventory rows.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Every item, ordered by expiration date ascending.
    async fn list_all(&self) -> AppResult<Vec<InventoryItem>>;

    /// Overwrite the derived fields of one item.
    async fn update_expiration(
        &self,
        id: ItemId,
        expiration_date: NaiveDate,
        status: ExpirationStatus,
    ) -> AppResult<()>;

    /// Persist a new item; the store assigns `id` and `code`.
    async fn insert(
        &self,
        item: NewInventoryItem,
        expiration_date: NaiveDate,
        status: ExpirationStatus,
    ) -> AppResult<InventoryItem>;
}

/// Mean temperature/humidity over a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClimateAverage {
    /// Mean temperature in °C.
    pub temperature: f64,
    /// Mean relative humidity in %.
    pub humidity: f64,
    /// Number of samples averaged.
    pub samples: usize,
}

/// Durable log of accepted samples.
#[async_trait]
pub trait TemperatureLogStore: Send + Sync {
    /// Record one accepted sample.
    async fn append(&self, sample: &TemperatureSample) -> AppResult<()>;

    /// Most recent sample, if any.
    async fn latest(&self) -> AppResult<Option<TemperatureSample>>;

    /// Up to `limit` samples, newest first.
    async fn history(&self, limit: usize) -> AppResult<Vec<TemperatureSample>>;

    /// Mean over the last `window_hours` hours; `None` when the window is empty.
    async fn average(&self, window_hours: u32) -> AppResult<Option<ClimateAverage>>;
}

/// Runtime key/value configuration.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Write a value.
    async fn set(&self, key: &str, value: &str) -> AppResult<()>;
}
