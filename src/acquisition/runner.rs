//! Background acquisition task.
//!
//! One task per process owns the state machine, the hardware channel, the
//! simulator timer and the retry timer. Lines are read by a helper task per open
//! channel so that `select!` never cancels a half-read line. Events from a channel
//! that was closed since carry an old generation number and are dropped.

use super::machine::{AcquisitionEvent, AcquisitionMachine, Action};
use super::parser::parse_line;
use super::{AcquiredSample, AcquisitionSettings, AcquisitionStatus};
use chrono::Utc;
use freshtrack_core::{
    check_temperature_alert, settings_keys, AlertLevel, AppResult, FreshError, LatestSample,
    LineSource, LinkOpener, SampleSource, SettingsStore, TemperatureLogStore, TemperatureSample,
};
use freshtrack_driver_sim::SimulatedClimate;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Requests from [`super::SensorAcquisition`] to the task.
#[derive(Debug)]
pub(crate) enum Command {
    SetSimulation {
        enabled: bool,
        reply: oneshot::Sender<AppResult<AcquisitionStatus>>,
    },
    ChangePort {
        port: String,
        reply: oneshot::Sender<AppResult<AcquisitionStatus>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

#[derive(Debug)]
enum LinkEvent {
    Line(String),
    Closed,
    Fault(FreshError),
}

struct OpenLink {
    generation: u64,
    reader: JoinHandle<()>,
}

/// Collaborators and channels handed to the task.
pub(crate) struct RunnerParts {
    pub settings: AcquisitionSettings,
    pub serial_port: String,
    pub simulation_mode: bool,
    pub opener: Arc<dyn LinkOpener>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub log: Arc<dyn TemperatureLogStore>,
    pub latest: LatestSample,
    pub samples: broadcast::Sender<AcquiredSample>,
    pub status: watch::Sender<AcquisitionStatus>,
    pub commands: mpsc::Receiver<Command>,
}

pub(crate) struct Runner {
    machine: AcquisitionMachine,
    settings: AcquisitionSettings,
    serial_port: String,
    simulation_mode: bool,
    opener: Arc<dyn LinkOpener>,
    settings_store: Arc<dyn SettingsStore>,
    log: Arc<dyn TemperatureLogStore>,
    latest: LatestSample,
    samples: broadcast::Sender<AcquiredSample>,
    status: watch::Sender<AcquisitionStatus>,
    commands: mpsc::Receiver<Command>,
    climate: SimulatedClimate,
    simulator: Option<Interval>,
    retry_at: Option<Instant>,
    link: Option<OpenLink>,
    generation: u64,
    link_events_tx: mpsc::Sender<(u64, LinkEvent)>,
    link_events_rx: mpsc::Receiver<(u64, LinkEvent)>,
}

impl Runner {
    pub(crate) fn new(parts: RunnerParts) -> Self {
        let (link_events_tx, link_events_rx) = mpsc::channel(64);
        let machine =
            AcquisitionMachine::new(parts.settings.retry.clone(), parts.settings.reconnect_delay);
        let climate = SimulatedClimate::new(parts.settings.climate.clone(), parts.settings.seed);
        Self {
            machine,
            settings: parts.settings,
            serial_port: parts.serial_port,
            simulation_mode: parts.simulation_mode,
            opener: parts.opener,
            settings_store: parts.settings_store,
            log: parts.log,
            latest: parts.latest,
            samples: parts.samples,
            status: parts.status,
            commands: parts.commands,
            climate,
            simulator: None,
            retry_at: None,
            link: None,
            generation: 0,
            link_events_tx,
            link_events_rx,
        }
    }

    pub(crate) async fn run(mut self) {
        let simulation_mode = self.simulation_mode;
        info!(
            simulation_mode,
            serial_port = %self.serial_port,
            "Sensor acquisition starting"
        );
        if let Err(e) = self
            .dispatch(AcquisitionEvent::Start { simulation_mode })
            .await
        {
            error!(error = %e, "Sensor acquisition startup failed");
        }

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.close_channel();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some((generation, event)) = self.link_events_rx.recv() => {
                    if generation == self.generation {
                        self.handle_link_event(event).await;
                    }
                }
                _ = wait_until(self.retry_at) => {
                    self.retry_at = None;
                    if let Err(e) = self.dispatch(AcquisitionEvent::RetryElapsed).await {
                        error!(error = %e, "Retry handling failed");
                    }
                }
                _ = next_tick(&mut self.simulator) => self.emit_simulated().await,
            }
        }

        self.close_channel();
        info!("Sensor acquisition stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetSimulation { enabled, reply } => {
                info!(enabled, "Simulation mode toggled");
                let result = self
                    .dispatch(AcquisitionEvent::SetSimulation(enabled))
                    .await
                    .map(|()| self.snapshot());
                let _ = reply.send(result);
            }
            Command::ChangePort { port, reply } => {
                let result = self.change_port(port).await;
                let _ = reply.send(result);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn change_port(&mut self, port: String) -> AppResult<AcquisitionStatus> {
        self.settings_store
            .set(settings_keys::SERIAL_PORT, &port)
            .await?;
        info!(from = %self.serial_port, to = %port, "Serial port changed");
        self.serial_port = port;
        self.dispatch(AcquisitionEvent::PortChanged).await?;
        Ok(self.snapshot())
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        let result = match event {
            LinkEvent::Line(line) => {
                self.accept_line(&line).await;
                Ok(())
            }
            LinkEvent::Closed => {
                info!(serial_port = %self.serial_port, "Hardware channel closed");
                self.dispatch(AcquisitionEvent::ChannelClosed).await
            }
            LinkEvent::Fault(e) => {
                let fatal = e.is_fatal_fault();
                if fatal {
                    warn!(error = %e, "Hardware channel fault");
                } else {
                    debug!(error = %e, "Recoverable hardware channel error");
                }
                self.dispatch(AcquisitionEvent::ChannelFault {
                    fatal,
                    message: e.to_string(),
                })
                .await
            }
        };
        if let Err(e) = result {
            error!(error = %e, "Failed to handle channel event");
        }
    }

    /// Feed one event through the machine and carry out the resulting actions.
    ///
    /// Actions may produce follow-up events (an open reports its outcome); those
    /// are queued and handled in order. Every action runs even if an earlier one
    /// failed; the first error is returned.
    async fn dispatch(&mut self, event: AcquisitionEvent) -> AppResult<()> {
        let mut queue = VecDeque::from([event]);
        let mut first_error = None;

        while let Some(event) = queue.pop_front() {
            let before = self.machine.state();
            debug!(?event, state = %before, "Acquisition event");
            let actions = self.machine.handle(event);
            let after = self.machine.state();
            if before != after {
                info!(
                    from = %before,
                    to = %after,
                    attempt = self.machine.attempts(),
                    "Acquisition state changed"
                );
            }

            for action in actions {
                match self.execute(action).await {
                    Ok(Some(follow_up)) => queue.push_back(follow_up),
                    Ok(None) => {}
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        self.publish_status();
        first_error.map_or(Ok(()), Err)
    }

    async fn execute(&mut self, action: Action) -> AppResult<Option<AcquisitionEvent>> {
        match action {
            Action::StartSimulator => {
                let mut interval = tokio::time::interval(self.settings.simulation_period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.simulator = Some(interval);
                info!(
                    period_ms = self.settings.simulation_period.as_millis() as u64,
                    "Simulator started"
                );
            }
            Action::StopSimulator => {
                self.simulator = None;
                info!("Simulator stopped");
            }
            Action::OpenChannel => return Ok(Some(self.open_channel().await)),
            Action::CloseChannel => self.close_channel(),
            Action::ScheduleRetry(delay) => {
                self.retry_at = Some(Instant::now() + delay);
                info!(
                    delay_ms = delay.as_millis() as u64,
                    attempt = self.machine.attempts(),
                    "Hardware retry scheduled"
                );
            }
            Action::CancelRetry => {
                if self.retry_at.take().is_some() {
                    debug!("Pending retry cancelled");
                }
            }
            Action::PersistSimulationMode(enabled) => {
                self.simulation_mode = enabled;
                let value = if enabled { "true" } else { "false" };
                if let Err(e) = self
                    .settings_store
                    .set(settings_keys::SIMULATION_MODE, value)
                    .await
                {
                    error!(error = %e, enabled, "Failed to persist simulation mode");
                    return Err(e);
                }
                if enabled && self.machine.attempts() > 0 {
                    warn!(
                        attempts = self.machine.attempts(),
                        "Hardware unreachable, simulation mode persisted"
                    );
                }
            }
        }
        Ok(None)
    }

    async fn open_channel(&mut self) -> AcquisitionEvent {
        self.close_channel();
        let port = self.serial_port.clone();
        let timeout = self.settings.open_timeout;
        let opened = tokio::time::timeout(
            timeout,
            self.opener.open(&port, self.settings.baud_rate),
        )
        .await;

        match opened {
            Ok(Ok(source)) => {
                self.spawn_reader(source);
                info!(serial_port = %port, baud_rate = self.settings.baud_rate, "Hardware channel open");
                AcquisitionEvent::OpenSucceeded
            }
            Ok(Err(e)) => {
                warn!(serial_port = %port, error = %e, "Hardware channel open failed");
                AcquisitionEvent::OpenFailed(e.to_string())
            }
            Err(_) => {
                let e = FreshError::ChannelTimeout {
                    path: port.clone(),
                    timeout,
                };
                warn!(serial_port = %port, error = %e, "Hardware channel open timed out");
                AcquisitionEvent::OpenFailed(e.to_string())
            }
        }
    }

    fn spawn_reader(&mut self, mut source: Box<dyn LineSource>) {
        self.generation += 1;
        let generation = self.generation;
        let events = self.link_events_tx.clone();
        let reader = tokio::spawn(async move {
            loop {
                let (event, done) = match source.next_line().await {
                    Ok(Some(line)) => (LinkEvent::Line(line), false),
                    Ok(None) => (LinkEvent::Closed, true),
                    Err(e) => {
                        let fatal = e.is_fatal_fault();
                        (LinkEvent::Fault(e), fatal)
                    }
                };
                if events.send((generation, event)).await.is_err() || done {
                    break;
                }
            }
        });
        self.link = Some(OpenLink { generation, reader });
    }

    fn close_channel(&mut self) {
        if let Some(link) = self.link.take() {
            link.reader.abort();
            debug!(generation = link.generation, "Hardware channel closed locally");
        }
        // Anything still queued from the old channel is now stale.
        self.generation += 1;
    }

    async fn accept_line(&mut self, line: &str) {
        match parse_line(line) {
            Ok(reading) => {
                let previous = self.latest.get();
                let (temperature, humidity) =
                    reading.merge(previous.temperature, previous.humidity);
                self.accept(temperature, humidity, SampleSource::Sensor)
                    .await;
            }
            Err(e) => debug!(line, error = %e, "Discarding unparseable line"),
        }
    }

    async fn emit_simulated(&mut self) {
        let (temperature, humidity) = self.climate.next_reading();
        self.accept(temperature, humidity, SampleSource::Simulation)
            .await;
    }

    /// Validate, publish, log and classify one reading.
    async fn accept(&mut self, temperature: f64, humidity: f64, source: SampleSource) {
        let sample = match TemperatureSample::validated(temperature, humidity, source, Utc::now())
        {
            Ok(sample) => Arc::new(sample),
            Err(e) => {
                warn!(temperature, humidity, %source, error = %e, "Discarding out-of-range sample");
                return;
            }
        };

        self.latest.publish(sample.clone());
        if let Err(e) = self.log.append(&sample).await {
            error!(error = %e, "Failed to append sample to temperature log");
        }

        let alert = check_temperature_alert(temperature, &self.settings.alerts);
        match alert {
            AlertLevel::Critical => {
                error!(temperature, humidity, %source, "Critical temperature alert")
            }
            AlertLevel::Warning => warn!(temperature, humidity, %source, "Temperature warning"),
            AlertLevel::None => debug!(temperature, humidity, %source, "Sample accepted"),
        }

        // No subscribers is fine.
        let _ = self.samples.send(AcquiredSample { sample, alert });
    }

    fn snapshot(&self) -> AcquisitionStatus {
        AcquisitionStatus {
            state: self.machine.state(),
            simulation_active: self.machine.simulator_active(),
            simulation_mode: self.simulation_mode,
            attempts: self.machine.attempts(),
            serial_port: self.serial_port.clone(),
            last_error: self.machine.last_error().map(str::to_string),
        }
    }

    fn publish_status(&self) {
        self.status.send_replace(self.snapshot());
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

