//! Service wiring.
//!
//! [`FreshTrack`] builds the stores from configuration, seeds food types and
//! thresholds, starts sensor acquisition, builds the expiration engine on the
//! shared latest-sample cell and runs the periodic recompute pass.

use crate::acquisition::{
    default_opener, AcquisitionSettings, AcquisitionStatus, SensorAcquisition,
};
use crate::config::FreshConfig;
use crate::engine::ExpirationEngine;
use crate::store::{
    MemoryInventoryStore, MemoryPolicyStore, MemorySettingsStore, MemoryTemperatureLog,
    TomlSettingsStore,
};
use freshtrack_core::{
    settings_keys, AppResult, ClimateAverage, Clock, LatestSample, LinkOpener, PolicyStore,
    SettingsStore, SystemClock, TemperatureLogStore, TemperatureSample, TemperatureThresholds,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Snapshot for a dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    /// Connection label (`Simulation`, `Connected`, `Error: ...`).
    pub connection: String,
    /// Acquisition details.
    pub acquisition: AcquisitionStatus,
    /// Most recent accepted sample.
    pub latest: TemperatureSample,
    /// Mean over the last 24 hours.
    pub average_24h: Option<ClimateAverage>,
    /// Thresholds in force.
    pub thresholds: TemperatureThresholds,
    /// Number of inventory items.
    pub items: usize,
}

/// The running tracker.
pub struct FreshTrack {
    config: FreshConfig,
    policies: Arc<MemoryPolicyStore>,
    inventory: Arc<MemoryInventoryStore>,
    log: Arc<MemoryTemperatureLog>,
    settings: Arc<dyn SettingsStore>,
    engine: Arc<ExpirationEngine>,
    acquisition: SensorAcquisition,
    stop: watch::Sender<bool>,
    recompute_task: Mutex<Option<JoinHandle<()>>>,
}

impl FreshTrack {
    /// Start with the platform hardware link and the system clock.
    pub async fn start(config: FreshConfig) -> AppResult<Self> {
        Self::start_with(config, default_opener(), Arc::new(SystemClock)).await
    }

    /// Start with an explicit hardware link and clock.
    ///
    /// # Errors
    ///
    /// Invalid configuration, or a settings file that cannot be read.
    pub async fn start_with(
        config: FreshConfig,
        opener: Arc<dyn LinkOpener>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        config.validate()?;

        let settings: Arc<dyn SettingsStore> = match &config.storage.settings_file {
            Some(path) => Arc::new(TomlSettingsStore::open(path).await?),
            None => Arc::new(MemorySettingsStore::new()),
        };

        let thresholds = load_thresholds(config.expiration.thresholds(), settings.as_ref()).await;
        let policies = Arc::new(MemoryPolicyStore::new(config.food_policies()?, thresholds));
        let inventory = Arc::new(MemoryInventoryStore::with_clock(clock.clone()));
        let log = Arc::new(MemoryTemperatureLog::new(config.storage.log_capacity));
        let latest = LatestSample::new();

        let acquisition =
            SensorAcquisition::builder(AcquisitionSettings::from_config(&config.sensor, &config.alerts))
                .latest(latest.clone())
                .opener(opener)
                .settings_store(settings.clone())
                .temperature_log(log.clone())
                .simulation_mode(config.sensor.simulation_mode)
                .force_simulation(config.sensor.force_simulation)
                .spawn()
                .await?;

        let engine = Arc::new(
            ExpirationEngine::new(policies.clone(), inventory.clone(), latest).with_clock(clock),
        );

        let (stop, stop_rx) = watch::channel(false);
        let recompute_task = match config.expiration.recompute_interval_secs {
            0 => None,
            secs => Some(tokio::spawn(recompute_loop(
                engine.clone(),
                Duration::from_secs(secs),
                stop_rx,
            ))),
        };

        info!(
            name = %config.application.name,
            food_types = config.food_types.len(),
            high_threshold = thresholds.high_threshold,
            medium_threshold = thresholds.medium_threshold,
            warning_window_days = thresholds.warning_window_days,
            "FreshTrack started"
        );

        Ok(Self {
            config,
            policies,
            inventory,
            log,
            settings,
            engine,
            acquisition,
            stop,
            recompute_task: Mutex::new(recompute_task),
        })
    }

    /// Loaded configuration.
    pub fn config(&self) -> &FreshConfig {
        &self.config
    }

    /// Expiration engine bound to the shared latest sample.
    pub fn engine(&self) -> &Arc<ExpirationEngine> {
        &self.engine
    }

    /// Sensor acquisition handle.
    pub fn acquisition(&self) -> &SensorAcquisition {
        &self.acquisition
    }

    /// Inventory store.
    pub fn inventory(&self) -> &Arc<MemoryInventoryStore> {
        &self.inventory
    }

    /// Policy store.
    pub fn policies(&self) -> &Arc<MemoryPolicyStore> {
        &self.policies
    }

    /// Temperature log.
    pub fn temperature_log(&self) -> &Arc<MemoryTemperatureLog> {
        &self.log
    }

    /// Persist new thresholds, put them in force and reclassify every item.
    ///
    /// Nothing changes in memory unless every setting was written, so the stored
    /// statuses always match the thresholds in force.
    ///
    /// Returns the number of items rewritten.
    pub async fn update_thresholds(&self, thresholds: TemperatureThresholds) -> AppResult<usize> {
        thresholds.validate()?;
        self.settings
            .set(
                settings_keys::TEMPERATURE_THRESHOLD_HIGH,
                &thresholds.high_threshold.to_string(),
            )
            .await?;
        self.settings
            .set(
                settings_keys::TEMPERATURE_THRESHOLD_MEDIUM,
                &thresholds.medium_threshold.to_string(),
            )
            .await?;
        self.settings
            .set(
                settings_keys::WARNING_DAYS,
                &thresholds.warning_window_days.to_string(),
            )
            .await?;
        self.policies.set_thresholds(thresholds)?;
        info!(
            high_threshold = thresholds.high_threshold,
            medium_threshold = thresholds.medium_threshold,
            warning_window_days = thresholds.warning_window_days,
            "Thresholds updated"
        );
        self.engine.recompute_all().await
    }

    /// Dashboard snapshot.
    pub async fn status(&self) -> AppResult<SystemStatus> {
        let acquisition = self.acquisition.status();
        Ok(SystemStatus {
            connection: acquisition.label(),
            acquisition,
            latest: (*self.acquisition.latest()).clone(),
            average_24h: self.log.average(24).await?,
            thresholds: self.policies.get_thresholds().await?,
            items: self.inventory.len(),
        })
    }

    /// Stop the recompute task and sensor acquisition.
    pub async fn shutdown(&self) {
        let _ = self.stop.send(true);
        let task = self.recompute_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Recompute task ended abnormally");
            }
        }
        self.acquisition.shutdown().await;
        info!("FreshTrack stopped");
    }
}

impl std::fmt::Debug for FreshTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreshTrack")
            .field("acquisition", &self.acquisition)
            .field("inventory", &self.inventory)
            .finish()
    }
}

async fn recompute_loop(
    engine: Arc<ExpirationEngine>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = engine.recompute_all().await {
                    error!(error = %e, "Recompute pass failed");
                }
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
}

/// Apply stored threshold overrides on top of the configured values.
async fn load_thresholds(
    configured: TemperatureThresholds,
    settings: &dyn SettingsStore,
) -> TemperatureThresholds {
    let mut thresholds = configured;
    if let Some(v) = read_setting(settings, settings_keys::TEMPERATURE_THRESHOLD_HIGH).await {
        thresholds.high_threshold = v;
    }
    if let Some(v) = read_setting(settings, settings_keys::TEMPERATURE_THRESHOLD_MEDIUM).await {
        thresholds.medium_threshold = v;
    }
    if let Some(v) = read_setting(settings, settings_keys::WARNING_DAYS).await {
        thresholds.warning_window_days = v;
    }
    match thresholds.validate() {
        Ok(()) => thresholds,
        Err(e) => {
            warn!(error = %e, "Stored thresholds rejected, using configured values");
            configured
        }
    }
}

async fn read_setting<T: std::str::FromStr>(settings: &dyn SettingsStore, key: &str) -> Option<T> {
    match settings.get(key).await {
        Ok(Some(raw)) => match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, value = %raw, "Ignoring unparseable setting");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(key, error = %e, "Cannot read setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stored_thresholds_override_config() {
        let settings = MemorySettingsStore::with_values([
            (settings_keys::TEMPERATURE_THRESHOLD_HIGH, "12.5"),
            (settings_keys::WARNING_DAYS, "4"),
        ]);
        let thresholds = load_thresholds(TemperatureThresholds::default(), &settings).await;
        assert_eq!(thresholds.high_threshold, 12.5);
        assert_eq!(thresholds.medium_threshold, 5.0);
        assert_eq!(thresholds.warning_window_days, 4);
    }

    #[tokio::test]
    async fn test_inconsistent_stored_thresholds_are_ignored() {
        let settings = MemorySettingsStore::with_values([
            (settings_keys::TEMPERATURE_THRESHOLD_HIGH, "1.0"),
            (settings_keys::WARNING_DAYS, "soon"),
        ]);
        let thresholds = load_thresholds(TemperatureThresholds::default(), &settings).await;
        assert_eq!(thresholds, TemperatureThresholds::default());
    }
}
