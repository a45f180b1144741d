//! Configuration System using Figment
//!
//! Strongly-typed configuration for the tracker. Configuration is loaded from:
//! 1. `config/freshtrack.toml` (base configuration)
//! 2. Environment variables prefixed with `FRESHTRACK_`, nested keys separated by `__`
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! runnable configuration.
//!
//! # Example
//! ```no_run
//! use freshtrack::config::FreshConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // FRESHTRACK_SENSOR__SERIAL_PORT=/dev/ttyACM0 overrides sensor.serial_port
//! let config = FreshConfig::load()?;
//! config.validate()?;
//! println!("Application: {}", config.application.name);
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use freshtrack_core::{
    AlertThresholds, BackoffSchedule, FoodTypePolicy, FreshError, RetryPolicy,
    TemperatureThresholds,
};
use freshtrack_driver_sim::ClimateProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/freshtrack.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "FRESHTRACK_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FreshConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Sensor acquisition settings
    #[serde(default)]
    pub sensor: SensorConfig,
    /// Expiration engine settings
    #[serde(default)]
    pub expiration: ExpirationConfig,
    /// Temperature alert thresholds
    #[serde(default)]
    pub alerts: AlertConfig,
    /// Store settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Food types seeded into the policy store
    #[serde(default)]
    pub food_types: Vec<FoodTypeDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Sensor acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Start on the simulator instead of the hardware link
    #[serde(default)]
    pub simulation_mode: bool,
    /// Device path of the hardware link
    #[serde(default = "default_serial_port")]
    pub serial_port: String,
    /// Baud rate of the hardware link
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Bounded wait for the channel to open, in milliseconds
    #[serde(default = "default_open_timeout")]
    pub open_timeout_ms: u64,
    /// Delay before reconnecting after a disconnect, in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Capacity of the sample broadcast buffer
    #[serde(default = "default_sample_capacity")]
    pub sample_capacity: usize,
    /// Retry policy for failed opens
    #[serde(default)]
    pub retry: RetryConfig,
    /// Simulator settings
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Start on the simulator for this run only, ignoring and never writing the
    /// stored `simulation_mode` setting. Set by `run --simulate`, never read from files.
    #[serde(skip)]
    pub force_simulation: bool,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            simulation_mode: false,
            serial_port: default_serial_port(),
            baud_rate: default_baud_rate(),
            open_timeout_ms: default_open_timeout(),
            reconnect_delay_ms: default_reconnect_delay(),
            sample_capacity: default_sample_capacity(),
            retry: RetryConfig::default(),
            simulation: SimulationConfig::default(),
            force_simulation: false,
        }
    }
}

impl SensorConfig {
    /// Open timeout as a `Duration`.
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    /// Reconnect delay as a `Duration`.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Retry policy consumed by the acquisition state machine.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff_delay: Duration::from_millis(self.retry.backoff_ms),
            schedule: self.retry.schedule,
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
        }
    }
}

/// Retry configuration for the hardware link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Failed opens before falling back to simulation permanently
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts, in milliseconds
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,
    /// fixed or exponential
    #[serde(default)]
    pub schedule: BackoffSchedule,
    /// Upper bound for exponential backoff, in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff(),
            schedule: BackoffSchedule::default(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Period between synthetic samples, in milliseconds
    #[serde(default = "default_simulation_period")]
    pub period_ms: u64,
    /// Seed for reproducible readings
    #[serde(default)]
    pub seed: Option<u64>,
    /// Random-walk band and step sizes
    #[serde(flatten)]
    pub climate: ClimateProfile,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            period_ms: default_simulation_period(),
            seed: None,
            climate: ClimateProfile::default(),
        }
    }
}

impl SimulationConfig {
    /// Sample period as a `Duration`.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Expiration engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirationConfig {
    /// Above this temperature shelf life is cut by 30%
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    /// Above this temperature shelf life is cut by 15%
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
    /// Days before expiration that count as "warning"
    #[serde(default = "default_warning_window")]
    pub warning_window_days: u32,
    /// Period of the background recompute pass (0 = disabled)
    #[serde(default = "default_recompute_interval")]
    pub recompute_interval_secs: u64,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
            warning_window_days: default_warning_window(),
            recompute_interval_secs: default_recompute_interval(),
        }
    }
}

impl ExpirationConfig {
    /// Thresholds used until an administrator overrides them.
    pub fn thresholds(&self) -> TemperatureThresholds {
        TemperatureThresholds {
            high_threshold: self.high_threshold,
            medium_threshold: self.medium_threshold,
            warning_window_days: self.warning_window_days,
        }
    }
}

/// Temperature alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Warning alert at or above this temperature
    #[serde(default = "default_warning_temp")]
    pub warning_temp: f64,
    /// Critical alert at or above this temperature
    #[serde(default = "default_critical_temp")]
    pub critical_temp: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            warning_temp: default_warning_temp(),
            critical_temp: default_critical_temp(),
        }
    }
}

impl AlertConfig {
    /// Thresholds for `check_temperature_alert`.
    pub fn thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            warning_temp: self.warning_temp,
            critical_temp: self.critical_temp,
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// TOML file holding runtime settings (in memory only when unset)
    #[serde(default)]
    pub settings_file: Option<PathBuf>,
    /// Number of samples kept by the temperature log
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_file: None,
            log_capacity: default_log_capacity(),
        }
    }
}

/// Food type seed entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodTypeDefinition {
    /// Unique food type code
    pub type_code: String,
    /// Human readable name
    pub display_name: String,
    /// Shelf life under nominal conditions
    pub base_expiration_days: u32,
}

// Default value functions
fn default_name() -> String {
    "FreshTrack".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_serial_port() -> String {
    "COM7".to_string()
}

fn default_baud_rate() -> u32 {
    freshtrack_core::limits::DEFAULT_BAUD_RATE
}

fn default_open_timeout() -> u64 {
    5000
}

fn default_reconnect_delay() -> u64 {
    5000
}

fn default_sample_capacity() -> usize {
    256
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff() -> u64 {
    5000
}

fn default_max_backoff() -> u64 {
    60_000
}

fn default_simulation_period() -> u64 {
    10_000
}

fn default_high_threshold() -> f64 {
    8.0
}

fn default_medium_threshold() -> f64 {
    5.0
}

fn default_warning_window() -> u32 {
    10
}

fn default_recompute_interval() -> u64 {
    3600
}

fn default_warning_temp() -> f64 {
    25.0
}

fn default_critical_temp() -> f64 {
    28.0
}

fn default_log_capacity() -> usize {
    10_000
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

impl FreshConfig {
    /// Load configuration from `config/freshtrack.toml` and environment variables
    ///
    /// Environment variables override the file with prefix `FRESHTRACK_`.
    /// Example: `FRESHTRACK_APPLICATION__LOG_LEVEL=debug`
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), FreshError> {
        self.validate_inner().map_err(FreshError::Configuration)
    }

    fn validate_inner(&self) -> Result<(), String> {
        let level = self.application.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LOG_LEVELS.join(", ")
            ));
        }

        let format = self.application.log_format.to_lowercase();
        if !VALID_LOG_FORMATS.contains(&format.as_str()) {
            return Err(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                VALID_LOG_FORMATS.join(", ")
            ));
        }

        self.expiration
            .thresholds()
            .validate()
            .map_err(|e| e.to_string())?;

        if self.alerts.warning_temp >= self.alerts.critical_temp {
            return Err(format!(
                "alerts.warning_temp ({}) must be below alerts.critical_temp ({})",
                self.alerts.warning_temp, self.alerts.critical_temp
            ));
        }

        let sensor = &self.sensor;
        if sensor.serial_port.trim().is_empty() {
            return Err("sensor.serial_port cannot be empty".to_string());
        }
        if sensor.baud_rate == 0 {
            return Err("sensor.baud_rate must be greater than 0".to_string());
        }
        if sensor.retry.max_attempts == 0 {
            return Err("sensor.retry.max_attempts must be greater than 0".to_string());
        }
        if sensor.open_timeout_ms == 0
            || sensor.reconnect_delay_ms == 0
            || sensor.retry.backoff_ms == 0
            || sensor.simulation.period_ms == 0
        {
            return Err(
                "sensor timeouts, delays and the simulation period must be greater than 0"
                    .to_string(),
            );
        }
        if sensor.sample_capacity == 0 {
            return Err("sensor.sample_capacity must be greater than 0".to_string());
        }
        sensor
            .simulation
            .climate
            .validate()
            .map_err(|e| format!("sensor.simulation: {}", e))?;

        if self.storage.log_capacity == 0 {
            return Err("storage.log_capacity must be greater than 0".to_string());
        }

        let mut codes = HashSet::new();
        for food_type in &self.food_types {
            if !codes.insert(food_type.type_code.as_str()) {
                return Err(format!("Duplicate food type code: {}", food_type.type_code));
            }
        }
        self.food_policies().map_err(|e| e.to_string())?;

        Ok(())
    }

    /// Food type seed list as validated policies.
    pub fn food_policies(&self) -> Result<Vec<FoodTypePolicy>, FreshError> {
        self.food_types
            .iter()
            .map(|def| {
                FoodTypePolicy::new(
                    def.type_code.clone(),
                    def.display_name.clone(),
                    def.base_expiration_days,
                )
            })
            .collect()
    }
}
