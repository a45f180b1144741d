//! Sensor acquisition.
//!
//! Maintains exactly one active data source (hardware link or simulator), falls
//! back and retries between them, and publishes every accepted sample:
//!
//! - the shared [`LatestSample`] cell is replaced atomically,
//! - the sample is appended to the temperature log,
//! - an [`AcquiredSample`] (sample plus alert classification) is broadcast to
//!   subscribers in acquisition order.
//!
//! The transition table lives in [`machine`]; the task that carries out its
//! actions is private to this module and reached through [`SensorAcquisition`].
//!
//! # Example
//!
//! ```no_run
//! use freshtrack::acquisition::{AcquisitionSettings, SensorAcquisition};
//! use freshtrack::store::{MemorySettingsStore, MemoryTemperatureLog};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let acquisition = SensorAcquisition::builder(AcquisitionSettings::default())
//!     .settings_store(Arc::new(MemorySettingsStore::new()))
//!     .temperature_log(Arc::new(MemoryTemperatureLog::new(1_000)))
//!     .simulation_mode(true)
//!     .spawn()
//!     .await?;
//!
//! let mut samples = acquisition.subscribe();
//! let first = samples.recv().await?;
//! println!("{} °C ({:?})", first.sample.temperature, first.alert);
//! acquisition.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod link;
pub mod machine;
mod parser;
mod runner;

pub use link::{default_opener, UnavailableLinkOpener};
pub use machine::{AcquisitionEvent, AcquisitionMachine, AcquisitionState, Action};
pub use parser::{parse_line, Reading};

use crate::config::{AlertConfig, SensorConfig};
use freshtrack_core::limits::{
    DEFAULT_BAUD_RATE, OPEN_TIMEOUT, RECONNECT_DELAY, SIMULATION_PERIOD,
};
use freshtrack_core::{
    settings_keys, AlertLevel, AlertThresholds, AppResult, FreshError, LatestSample, LinkOpener,
    RetryPolicy, SettingsStore, TemperatureLogStore, TemperatureSample,
};
use freshtrack_driver_sim::ClimateProfile;
use parking_lot::Mutex;
use runner::{Command, Runner, RunnerParts};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

/// Static acquisition settings.
#[derive(Debug, Clone)]
pub struct AcquisitionSettings {
    /// Device path used when no runtime override is stored.
    pub serial_port: String,
    /// Baud rate of the hardware link.
    pub baud_rate: u32,
    /// Bounded wait for an open.
    pub open_timeout: Duration,
    /// Retry budget and backoff for failed opens.
    pub retry: RetryPolicy,
    /// Delay before reconnecting after a disconnect.
    pub reconnect_delay: Duration,
    /// Period of synthetic samples.
    pub simulation_period: Duration,
    /// Random-walk band of the simulator.
    pub climate: ClimateProfile,
    /// Simulator seed.
    pub seed: Option<u64>,
    /// Broadcast buffer; slow subscribers beyond it observe a lag.
    pub sample_capacity: usize,
    /// Alert classification thresholds.
    pub alerts: AlertThresholds,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            serial_port: "COM7".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            open_timeout: OPEN_TIMEOUT,
            retry: RetryPolicy::default(),
            reconnect_delay: RECONNECT_DELAY,
            simulation_period: SIMULATION_PERIOD,
            climate: ClimateProfile::default(),
            seed: None,
            sample_capacity: 256,
            alerts: AlertThresholds::default(),
        }
    }
}

impl AcquisitionSettings {
    /// Build from the configuration sections.
    pub fn from_config(sensor: &SensorConfig, alerts: &AlertConfig) -> Self {
        Self {
            serial_port: sensor.serial_port.clone(),
            baud_rate: sensor.baud_rate,
            open_timeout: sensor.open_timeout(),
            retry: sensor.retry_policy(),
            reconnect_delay: sensor.reconnect_delay(),
            simulation_period: sensor.simulation.period(),
            climate: sensor.simulation.climate.clone(),
            seed: sensor.simulation.seed,
            sample_capacity: sensor.sample_capacity,
            alerts: alerts.thresholds(),
        }
    }
}

/// An accepted sample with its alert classification.
#[derive(Debug, Clone)]
pub struct AcquiredSample {
    /// The sample, shared with the latest-sample cell.
    pub sample: Arc<TemperatureSample>,
    /// Alert level of `sample.temperature`.
    pub alert: AlertLevel,
}

/// Snapshot of the acquisition task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionStatus {
    /// Current state.
    pub state: AcquisitionState,
    /// Whether the simulator is producing samples (also during hardware retries).
    pub simulation_active: bool,
    /// Persisted simulation flag.
    pub simulation_mode: bool,
    /// Consecutive failed opens in the current cycle.
    pub attempts: u32,
    /// Device path in use.
    pub serial_port: String,
    /// Most recent channel error.
    pub last_error: Option<String>,
}

impl AcquisitionStatus {
    fn initial(serial_port: String, simulation_mode: bool) -> Self {
        Self {
            state: AcquisitionState::Uninitialized,
            simulation_active: false,
            simulation_mode,
            attempts: 0,
            serial_port,
            last_error: None,
        }
    }

    /// Connection label shown to operators.
    pub fn label(&self) -> String {
        match self.state {
            AcquisitionState::Uninitialized => "Disconnected".to_string(),
            AcquisitionState::Simulating => "Simulation".to_string(),
            AcquisitionState::Connecting => "Connecting".to_string(),
            AcquisitionState::Connected => "Connected".to_string(),
            AcquisitionState::Reconnecting => "Reconnecting".to_string(),
            AcquisitionState::Error => format!(
                "Error: {}",
                self.last_error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Builder for [`SensorAcquisition`].
pub struct SensorAcquisitionBuilder {
    settings: AcquisitionSettings,
    latest: Option<LatestSample>,
    opener: Option<Arc<dyn LinkOpener>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    log: Option<Arc<dyn TemperatureLogStore>>,
    simulation_mode: bool,
    force_simulation: bool,
}

impl SensorAcquisitionBuilder {
    /// Share an existing latest-sample cell instead of creating one.
    pub fn latest(mut self, latest: LatestSample) -> Self {
        self.latest = Some(latest);
        self
    }

    /// Hardware link opener (defaults to [`default_opener`]).
    pub fn opener(mut self, opener: Arc<dyn LinkOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Runtime settings store (required).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Temperature log (required).
    pub fn temperature_log(mut self, log: Arc<dyn TemperatureLogStore>) -> Self {
        self.log = Some(log);
        self
    }

    /// Simulation flag used when the settings store holds none.
    pub fn simulation_mode(mut self, enabled: bool) -> Self {
        self.simulation_mode = enabled;
        self
    }

    /// Start on the simulator whatever the settings store holds, without
    /// persisting anything. A later administrative toggle persists as usual.
    pub fn force_simulation(mut self, enabled: bool) -> Self {
        self.force_simulation = enabled;
        self
    }

    /// Resolve runtime settings and spawn the acquisition task.
    ///
    /// A stored `simulation_mode` wins over the configured flag; if it cannot be
    /// read the task starts in simulation. [`Self::force_simulation`] wins over
    /// both. A stored `serial_port` wins over the configured port.
    ///
    /// # Errors
    ///
    /// [`FreshError::Configuration`] when a required collaborator is missing.
    pub async fn spawn(self) -> AppResult<SensorAcquisition> {
        let settings_store = self.settings_store.ok_or_else(|| {
            FreshError::Configuration("sensor acquisition requires a settings store".into())
        })?;
        let log = self.log.ok_or_else(|| {
            FreshError::Configuration("sensor acquisition requires a temperature log".into())
        })?;

        let simulation_mode = if self.force_simulation {
            info!("Simulation forced for this run");
            true
        } else {
            match settings_store.get(settings_keys::SIMULATION_MODE).await {
                Ok(Some(value)) => value.trim().eq_ignore_ascii_case("true"),
                Ok(None) => self.simulation_mode,
                Err(e) => {
                    warn!(error = %e, "Cannot read simulation_mode, starting in simulation");
                    true
                }
            }
        };
        let serial_port = match settings_store.get(settings_keys::SERIAL_PORT).await {
            Ok(Some(port)) if !port.trim().is_empty() => port,
            Ok(_) => self.settings.serial_port.clone(),
            Err(e) => {
                warn!(error = %e, "Cannot read serial_port, using configured port");
                self.settings.serial_port.clone()
            }
        };

        let latest = self.latest.unwrap_or_default();
        let (samples, _) = broadcast::channel(self.settings.sample_capacity.max(1));
        let (status_tx, status_rx) = watch::channel(AcquisitionStatus::initial(
            serial_port.clone(),
            simulation_mode,
        ));
        let (command_tx, command_rx) = mpsc::channel(16);

        let runner = Runner::new(RunnerParts {
            settings: self.settings,
            serial_port,
            simulation_mode,
            opener: self.opener.unwrap_or_else(default_opener),
            settings_store,
            log,
            latest: latest.clone(),
            samples: samples.clone(),
            status: status_tx,
            commands: command_rx,
        });
        let task = tokio::spawn(runner.run().instrument(info_span!("sensor_acquisition")));

        Ok(SensorAcquisition {
            commands: command_tx,
            latest,
            samples,
            status: status_rx,
            task: Mutex::new(Some(task)),
        })
    }
}

/// Handle to the acquisition task.
///
/// Reading data never fails: callers always get a best-effort latest sample.
/// Dropping the handle aborts the task; prefer [`SensorAcquisition::shutdown`].
pub struct SensorAcquisition {
    commands: mpsc::Sender<Command>,
    latest: LatestSample,
    samples: broadcast::Sender<AcquiredSample>,
    status: watch::Receiver<AcquisitionStatus>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SensorAcquisition {
    /// Start building an acquisition task.
    pub fn builder(settings: AcquisitionSettings) -> SensorAcquisitionBuilder {
        SensorAcquisitionBuilder {
            settings,
            latest: None,
            opener: None,
            settings_store: None,
            log: None,
            simulation_mode: false,
            force_simulation: false,
        }
    }

    /// Most recent accepted sample.
    pub fn latest(&self) -> Arc<TemperatureSample> {
        self.latest.get()
    }

    /// The shared latest-sample cell.
    pub fn latest_cell(&self) -> LatestSample {
        self.latest.clone()
    }

    /// Receive every accepted sample, in acquisition order.
    pub fn subscribe(&self) -> broadcast::Receiver<AcquiredSample> {
        self.samples.subscribe()
    }

    /// Current status snapshot.
    pub fn status(&self) -> AcquisitionStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes.
    pub fn status_updates(&self) -> watch::Receiver<AcquisitionStatus> {
        self.status.clone()
    }

    /// Switch between simulation and hardware; the choice is persisted.
    ///
    /// Pending retries are cancelled first. Enabling closes the hardware channel;
    /// disabling reconnects with a fresh attempt counter.
    ///
    /// # Errors
    ///
    /// Settings store failures, or [`FreshError::AcquisitionStopped`].
    pub async fn set_simulation_mode(&self, enabled: bool) -> AppResult<AcquisitionStatus> {
        self.request(|reply| Command::SetSimulation { enabled, reply })
            .await
    }

    /// Persist a new device path, leave simulation and reconnect on it.
    ///
    /// # Errors
    ///
    /// Settings store failures, or [`FreshError::AcquisitionStopped`].
    pub async fn change_serial_port(
        &self,
        port: impl Into<String>,
    ) -> AppResult<AcquisitionStatus> {
        let port = port.into();
        if port.trim().is_empty() {
            return Err(FreshError::Configuration(
                "serial port cannot be empty".into(),
            ));
        }
        self.request(|reply| Command::ChangePort { port, reply })
            .await
    }

    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<AppResult<AcquisitionStatus>>) -> Command,
    ) -> AppResult<AcquisitionStatus> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| FreshError::AcquisitionStopped)?;
        response.await.map_err(|_| FreshError::AcquisitionStopped)?
    }

    /// Stop the task, close the channel and wait for it to finish.
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = done.await;
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Sensor acquisition task ended abnormally");
                }
            }
        }
    }
}

impl Drop for SensorAcquisition {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for SensorAcquisition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorAcquisition")
            .field("status", &*self.status.borrow())
            .field("latest", &self.latest)
            .finish()
    }
}
