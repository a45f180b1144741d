//! In-memory store adapters.
//!
//! Locks are `parking_lot` and never held across an `.await`.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use freshtrack_core::inventory::month_prefix;
use freshtrack_core::{
    next_item_code, AppResult, ClimateAverage, Clock, ExpirationStatus, FoodTypePolicy,
    FreshError, InventoryItem, InventoryStore, ItemId, NewInventoryItem, PolicyStore,
    SettingsStore, SystemClock, TemperatureLogStore, TemperatureSample, TemperatureThresholds,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

/// Food-type policies and thresholds held in memory.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    policies: RwLock<BTreeMap<String, FoodTypePolicy>>,
    thresholds: RwLock<TemperatureThresholds>,
}

impl MemoryPolicyStore {
    /// Seed the store.
    pub fn new(
        policies: impl IntoIterator<Item = FoodTypePolicy>,
        thresholds: TemperatureThresholds,
    ) -> Self {
        let policies = policies
            .into_iter()
            .map(|p| (p.type_code().to_string(), p))
            .collect();
        Self {
            policies: RwLock::new(policies),
            thresholds: RwLock::new(thresholds),
        }
    }

    /// Add or replace a policy.
    pub fn upsert(&self, policy: FoodTypePolicy) {
        self.policies
            .write()
            .insert(policy.type_code().to_string(), policy);
    }

    /// Replace the thresholds after validating them.
    pub fn set_thresholds(&self, thresholds: TemperatureThresholds) -> AppResult<()> {
        thresholds.validate()?;
        *self.thresholds.write() = thresholds;
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn get_policy(&self, type_code: &str) -> AppResult<Option<FoodTypePolicy>> {
        Ok(self.policies.read().get(type_code).cloned())
    }

    async fn list_policies(&self) -> AppResult<Vec<FoodTypePolicy>> {
        Ok(self.policies.read().values().cloned().collect())
    }

    async fn get_thresholds(&self) -> AppResult<TemperatureThresholds> {
        Ok(*self.thresholds.read())
    }
}

#[derive(Debug, Default)]
struct InventoryRows {
    items: Vec<InventoryItem>,
    next_id: ItemId,
}

/// Inventory rows held in memory.
pub struct MemoryInventoryStore {
    rows: Mutex<InventoryRows>,
    clock: Arc<dyn Clock>,
}

impl MemoryInventoryStore {
    /// Empty store generating codes from the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Empty store generating codes from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: Mutex::new(InventoryRows {
                items: Vec::new(),
                next_id: 1,
            }),
            clock,
        }
    }

    /// One item by id.
    pub fn get(&self, id: ItemId) -> Option<InventoryItem> {
        self.rows.lock().items.iter().find(|i| i.id == id).cloned()
    }

    /// Items with the given status, ordered by expiration date.
    pub fn by_status(&self, status: ExpirationStatus) -> Vec<InventoryItem> {
        let mut items: Vec<_> = self
            .rows
            .lock()
            .items
            .iter()
            .filter(|i| i.status == status)
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.expiration_date, i.id));
        items
    }

    /// Case-insensitive substring search over name, code, batch and location.
    pub fn search(&self, term: &str) -> Vec<InventoryItem> {
        let needle = term.to_lowercase();
        let mut items: Vec<_> = self
            .rows
            .lock()
            .items
            .iter()
            .filter(|i| {
                [&i.name, &i.code, &i.batch_number, &i.storage_location]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.expiration_date, i.id));
        items
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.rows.lock().items.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn last_code_for(items: &[InventoryItem], today: NaiveDate) -> Option<&str> {
        let prefix = month_prefix(today);
        items
            .iter()
            .map(|i| i.code.as_str())
            .filter(|code| code.starts_with(prefix.as_str()))
            .max()
    }
}

impl Default for MemoryInventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryInventoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryInventoryStore")
            .field("items", &self.len())
            .finish()
    }
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn list_all(&self) -> AppResult<Vec<InventoryItem>> {
        let mut items = self.rows.lock().items.clone();
        items.sort_by_key(|i| (i.expiration_date, i.id));
        Ok(items)
    }

    async fn update_expiration(
        &self,
        id: ItemId,
        expiration_date: NaiveDate,
        status: ExpirationStatus,
    ) -> AppResult<()> {
        let mut rows = self.rows.lock();
        let item = rows
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(FreshError::ItemNotFound(id))?;
        item.expiration_date = expiration_date;
        item.status = status;
        Ok(())
    }

    async fn insert(
        &self,
        item: NewInventoryItem,
        expiration_date: NaiveDate,
        status: ExpirationStatus,
    ) -> AppResult<InventoryItem> {
        let today = self.clock.today();
        let mut rows = self.rows.lock();
        let code = next_item_code(today, Self::last_code_for(&rows.items, today));
        let id = rows.next_id;
        rows.next_id += 1;
        let stored = item.into_item(id, code, expiration_date, status);
        rows.items.push(stored.clone());
        Ok(stored)
    }
}

/// Bounded temperature log; the oldest sample is dropped when full.
#[derive(Debug)]
pub struct MemoryTemperatureLog {
    samples: Mutex<VecDeque<TemperatureSample>>,
    capacity: usize,
}

impl MemoryTemperatureLog {
    /// Log keeping at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
        }
    }

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// Whether no sample was stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TemperatureLogStore for MemoryTemperatureLog {
    async fn append(&self, sample: &TemperatureSample) -> AppResult<()> {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample.clone());
        Ok(())
    }

    async fn latest(&self) -> AppResult<Option<TemperatureSample>> {
        Ok(self.samples.lock().back().cloned())
    }

    async fn history(&self, limit: usize) -> AppResult<Vec<TemperatureSample>> {
        Ok(self
            .samples
            .lock()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn average(&self, window_hours: u32) -> AppResult<Option<ClimateAverage>> {
        // A window reaching past chrono's range covers the whole log.
        let since = Utc::now().checked_sub_signed(ChronoDuration::hours(i64::from(window_hours)));
        let samples = self.samples.lock();
        let (count, temperature, humidity) = samples
            .iter()
            .filter(|s| since.map_or(true, |since| s.timestamp >= since))
            .fold((0usize, 0.0, 0.0), |(n, t, h), s| {
                (n + 1, t + s.temperature, h + s.humidity)
            });
        if count == 0 {
            return Ok(None);
        }
        Ok(Some(ClimateAverage {
            temperature: temperature / count as f64,
            humidity: humidity / count as f64,
            samples: count,
        }))
    }
}

/// Runtime settings held in memory.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettingsStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `values`.
    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
