//! Expiration engine.
//!
//! The `expiration` submodule holds the pure arithmetic. [`ExpirationEngine`] binds it to the
//! policy and inventory stores and to the shared [`LatestSample`] cell so that
//! registration and recompute passes read the same temperature.

mod expiration;

pub use expiration::{
    adjusted_days, classify_status, compute_expiration_date, days_until_expiration, estimate,
    plan_recompute, resolve_policy, temperature_factor, ExpirationEstimate, ExpirationUpdate,
    TemperatureFactor,
};

use freshtrack_core::{
    AppResult, Clock, FreshError, InventoryItem, InventoryStore, LatestSample, NewInventoryItem,
    PolicyStore, SystemClock, TemperatureSample,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Computes and maintains expiration dates of inventory items.
pub struct ExpirationEngine {
    policies: Arc<dyn PolicyStore>,
    inventory: Arc<dyn InventoryStore>,
    latest: LatestSample,
    clock: Arc<dyn Clock>,
    // At most one recompute pass in flight.
    recompute_lock: Mutex<()>,
}

impl ExpirationEngine {
    /// Create an engine reading "today" from the system clock.
    pub fn new(
        policies: Arc<dyn PolicyStore>,
        inventory: Arc<dyn InventoryStore>,
        latest: LatestSample,
    ) -> Self {
        Self {
            policies,
            inventory,
            latest,
            clock: Arc::new(SystemClock),
            recompute_lock: Mutex::new(()),
        }
    }

    /// Replace the calendar source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Estimate without touching the inventory.
    ///
    /// # Errors
    ///
    /// [`FreshError::UnknownFoodType`] when `type_code` has no policy; store
    /// errors are returned unmodified.
    pub async fn estimate(
        &self,
        type_code: &str,
        entry_date: chrono::NaiveDate,
        temperature: f64,
    ) -> AppResult<ExpirationEstimate> {
        let policy = self
            .policies
            .get_policy(type_code)
            .await?
            .ok_or_else(|| FreshError::UnknownFoodType(type_code.to_string()))?;
        let thresholds = self.policies.get_thresholds().await?;
        estimate(
            &policy,
            entry_date,
            temperature,
            &thresholds,
            self.clock.today(),
        )
    }

    /// Register a new item using the current latest sample.
    ///
    /// # Errors
    ///
    /// [`FreshError::UnknownFoodType`] rejects the registration; store errors
    /// are returned unmodified.
    #[instrument(skip(self, item), fields(food_type = %item.food_type_code))]
    pub async fn register(&self, item: NewInventoryItem) -> AppResult<InventoryItem> {
        let sample = self.latest.get();
        let result = self
            .estimate(&item.food_type_code, item.entry_date, sample.temperature)
            .await?;
        let stored = self
            .inventory
            .insert(item, result.expiration_date, result.status)
            .await?;
        info!(
            code = %stored.code,
            temperature = sample.temperature,
            source = %sample.source,
            expiration_date = %stored.expiration_date,
            status = %stored.status,
            "Registered inventory item"
        );
        Ok(stored)
    }

    /// Recompute every item against the current latest sample.
    ///
    /// Returns the number of items written.
    pub async fn recompute_all(&self) -> AppResult<usize> {
        let sample = self.latest.get();
        self.recompute_with(&sample).await
    }

    /// Recompute every item against `sample`.
    ///
    /// Passes are serialized. A pass that hits an unknown food type aborts
    /// before writing anything.
    #[instrument(skip(self, sample), fields(temperature = sample.temperature))]
    pub async fn recompute_with(&self, sample: &TemperatureSample) -> AppResult<usize> {
        let _pass = self.recompute_lock.lock().await;

        let items = self.inventory.list_all().await?;
        let policies: HashMap<String, _> = self
            .policies
            .list_policies()
            .await?
            .into_iter()
            .map(|p| (p.type_code().to_string(), p))
            .collect();
        let thresholds = self.policies.get_thresholds().await?;

        let updates = plan_recompute(
            &items,
            &policies,
            sample.temperature,
            &thresholds,
            self.clock.today(),
        )?;

        for update in &updates {
            self.inventory
                .update_expiration(update.id, update.expiration_date, update.status)
                .await?;
            debug!(
                id = update.id,
                expiration_date = %update.expiration_date,
                status = %update.status,
                "Updated expiration"
            );
        }

        info!(
            examined = items.len(),
            changed = updates.len(),
            "Recompute pass complete"
        );
        Ok(updates.len())
    }
}

impl std::fmt::Debug for ExpirationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirationEngine")
            .field("latest", &self.latest)
            .field("today", &self.clock.today())
            .finish()
    }
}
