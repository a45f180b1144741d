//! Acquisition transition table.
//!
//! [`AcquisitionMachine`] is pure: it consumes [`AcquisitionEvent`]s and returns the
//! [`Action`]s the runner must carry out, in order. Timers, channels and the
//! simulator live in the runner, so every transition can be tested without time.

use freshtrack_core::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection state of the acquisition task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionState {
    /// Not started yet.
    Uninitialized,
    /// Samples come from the simulator.
    Simulating,
    /// Opening the hardware channel.
    Connecting,
    /// Reading from the hardware channel.
    Connected,
    /// Channel closed; a reconnect is scheduled.
    Reconnecting,
    /// Open failed or the channel faulted; a retry is scheduled.
    Error,
}

impl std::fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AcquisitionState::Uninitialized => "uninitialized",
            AcquisitionState::Simulating => "simulating",
            AcquisitionState::Connecting => "connecting",
            AcquisitionState::Connected => "connected",
            AcquisitionState::Reconnecting => "reconnecting",
            AcquisitionState::Error => "error",
        };
        f.write_str(label)
    }
}

/// Input to the transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionEvent {
    /// Startup with the persisted simulation flag.
    Start {
        /// Whether to start on the simulator.
        simulation_mode: bool,
    },
    /// The channel opened.
    OpenSucceeded,
    /// The channel failed to open or the open timed out.
    OpenFailed(String),
    /// The device closed the channel.
    ChannelClosed,
    /// The channel reported an error.
    ChannelFault {
        /// Whether the error ends the connection.
        fatal: bool,
        /// Error description.
        message: String,
    },
    /// A scheduled retry or reconnect delay elapsed.
    RetryElapsed,
    /// Administrative simulation toggle.
    SetSimulation(bool),
    /// The device path changed; leave simulation and reconnect from scratch.
    PortChanged,
}

/// Side effect requested by the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start emitting synthetic samples.
    StartSimulator,
    /// Stop emitting synthetic samples.
    StopSimulator,
    /// Open the hardware channel and report back with `OpenSucceeded`/`OpenFailed`.
    OpenChannel,
    /// Drop the hardware channel if one is open.
    CloseChannel,
    /// Fire `RetryElapsed` after the delay, replacing any pending timer.
    ScheduleRetry(Duration),
    /// Cancel the pending retry timer.
    CancelRetry,
    /// Persist the `simulation_mode` setting.
    PersistSimulationMode(bool),
}

/// Pure acquisition state machine.
#[derive(Debug, Clone)]
pub struct AcquisitionMachine {
    state: AcquisitionState,
    attempts: u32,
    simulator_active: bool,
    last_error: Option<String>,
    policy: RetryPolicy,
    reconnect_delay: Duration,
}

impl AcquisitionMachine {
    /// New machine in [`AcquisitionState::Uninitialized`].
    pub fn new(policy: RetryPolicy, reconnect_delay: Duration) -> Self {
        Self {
            state: AcquisitionState::Uninitialized,
            attempts: 0,
            simulator_active: false,
            last_error: None,
            policy,
            reconnect_delay,
        }
    }

    /// Current state.
    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Consecutive failed opens in the current cycle.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the simulator is producing samples, temporarily or not.
    pub fn simulator_active(&self) -> bool {
        self.simulator_active
    }

    /// Most recent channel error, cleared on a successful open.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Apply one event and return the actions to perform.
    ///
    /// Events that make no sense in the current state (a late retry after an
    /// administrative toggle, for instance) are ignored and yield no action.
    pub fn handle(&mut self, event: AcquisitionEvent) -> Vec<Action> {
        use AcquisitionEvent as E;
        use AcquisitionState as S;

        match (self.state, event) {
            (S::Uninitialized, E::Start { simulation_mode: true }) => {
                self.state = S::Simulating;
                self.ensure_simulator()
            }
            (S::Uninitialized, E::Start { simulation_mode: false }) => {
                self.state = S::Connecting;
                vec![Action::OpenChannel]
            }

            (S::Connecting, E::OpenSucceeded) => {
                self.state = S::Connected;
                self.attempts = 0;
                self.last_error = None;
                self.stop_simulator()
            }
            // The open raced an administrative toggle; nobody wants this channel.
            (_, E::OpenSucceeded) => vec![Action::CloseChannel],

            (S::Connecting, E::OpenFailed(message)) => {
                self.attempts += 1;
                self.last_error = Some(message);
                if self.policy.is_exhausted(self.attempts) {
                    self.state = S::Simulating;
                    let mut actions = vec![Action::CancelRetry];
                    actions.extend(self.ensure_simulator());
                    actions.push(Action::PersistSimulationMode(true));
                    actions
                } else {
                    self.state = S::Error;
                    let mut actions = Vec::new();
                    if self.attempts == 1 {
                        actions.extend(self.ensure_simulator());
                    }
                    actions.push(Action::ScheduleRetry(self.policy.delay_for(self.attempts)));
                    actions
                }
            }

            (S::Error | S::Reconnecting, E::RetryElapsed) => {
                self.state = S::Connecting;
                vec![Action::OpenChannel]
            }

            (S::Connected, E::ChannelClosed) => {
                self.state = S::Reconnecting;
                self.attempts = 0;
                vec![
                    Action::CloseChannel,
                    Action::ScheduleRetry(self.reconnect_delay),
                ]
            }

            (S::Connected, E::ChannelFault { fatal: true, message }) => {
                self.state = S::Error;
                self.attempts = 0;
                self.last_error = Some(message);
                vec![
                    Action::CloseChannel,
                    Action::ScheduleRetry(self.reconnect_delay),
                ]
            }

            (_, E::SetSimulation(true)) => {
                self.state = S::Simulating;
                self.attempts = 0;
                let mut actions = vec![Action::CancelRetry, Action::CloseChannel];
                actions.extend(self.ensure_simulator());
                actions.push(Action::PersistSimulationMode(true));
                actions
            }

            (S::Connected, E::SetSimulation(false)) => {
                vec![Action::PersistSimulationMode(false)]
            }
            (_, E::SetSimulation(false)) | (_, E::PortChanged) => self.restart_hardware(),

            _ => Vec::new(),
        }
    }

    fn restart_hardware(&mut self) -> Vec<Action> {
        self.state = AcquisitionState::Connecting;
        self.attempts = 0;
        self.last_error = None;
        let mut actions = vec![Action::CancelRetry];
        actions.extend(self.stop_simulator());
        actions.push(Action::PersistSimulationMode(false));
        actions.push(Action::CloseChannel);
        actions.push(Action::OpenChannel);
        actions
    }

    fn ensure_simulator(&mut self) -> Vec<Action> {
        if self.simulator_active {
            Vec::new()
        } else {
            self.simulator_active = true;
            vec![Action::StartSimulator]
        }
    }

    fn stop_simulator(&mut self) -> Vec<Action> {
        if self.simulator_active {
            self.simulator_active = false;
            vec![Action::StopSimulator]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKOFF: Duration = Duration::from_secs(5);
    const RECONNECT: Duration = Duration::from_secs(5);

    fn machine() -> AcquisitionMachine {
        AcquisitionMachine::new(RetryPolicy::fixed(3, BACKOFF), RECONNECT)
    }

    fn connected() -> AcquisitionMachine {
        let mut m = machine();
        m.handle(AcquisitionEvent::Start {
            simulation_mode: false,
        });
        m.handle(AcquisitionEvent::OpenSucceeded);
        assert_eq!(m.state(), AcquisitionState::Connected);
        m
    }

    #[test]
    fn test_start_in_simulation() {
        let mut m = machine();
        let actions = m.handle(AcquisitionEvent::Start {
            simulation_mode: true,
        });
        assert_eq!(m.state(), AcquisitionState::Simulating);
        assert_eq!(actions, vec![Action::StartSimulator]);
        assert!(m.simulator_active());
    }

    #[test]
    fn test_start_on_hardware() {
        let mut m = machine();
        let actions = m.handle(AcquisitionEvent::Start {
            simulation_mode: false,
        });
        assert_eq!(m.state(), AcquisitionState::Connecting);
        assert_eq!(actions, vec![Action::OpenChannel]);
    }

    #[test]
    fn test_first_failure_starts_temporary_simulation() {
        let mut m = machine();
        m.handle(AcquisitionEvent::Start {
            simulation_mode: false,
        });

        let actions = m.handle(AcquisitionEvent::OpenFailed("busy".into()));
        assert_eq!(m.state(), AcquisitionState::Error);
        assert_eq!(
            actions,
            vec![Action::StartSimulator, Action::ScheduleRetry(BACKOFF)]
        );
        assert_eq!(m.attempts(), 1);
        assert_eq!(m.last_error(), Some("busy"));

        assert_eq!(
            m.handle(AcquisitionEvent::RetryElapsed),
            vec![Action::OpenChannel]
        );
        let actions = m.handle(AcquisitionEvent::OpenFailed("busy".into()));
        assert_eq!(actions, vec![Action::ScheduleRetry(BACKOFF)]);
    }

    #[test]
    fn test_exhausted_retries_fall_back_permanently() {
        let mut m = machine();
        m.handle(AcquisitionEvent::Start {
            simulation_mode: false,
        });
        for _ in 0..2 {
            m.handle(AcquisitionEvent::OpenFailed("no device".into()));
            m.handle(AcquisitionEvent::RetryElapsed);
        }
        let actions = m.handle(AcquisitionEvent::OpenFailed("no device".into()));

        assert_eq!(m.state(), AcquisitionState::Simulating);
        assert_eq!(m.attempts(), 3);
        assert_eq!(
            actions,
            vec![Action::CancelRetry, Action::PersistSimulationMode(true)]
        );
        assert!(m.simulator_active());

        // A stray retry cannot pull the machine out of simulation.
        assert!(m.handle(AcquisitionEvent::RetryElapsed).is_empty());
        assert_eq!(m.state(), AcquisitionState::Simulating);
    }

    #[test]
    fn test_connect_stops_temporary_simulation() {
        let mut m = machine();
        m.handle(AcquisitionEvent::Start {
            simulation_mode: false,
        });
        m.handle(AcquisitionEvent::OpenFailed("busy".into()));
        m.handle(AcquisitionEvent::RetryElapsed);

        let actions = m.handle(AcquisitionEvent::OpenSucceeded);
        assert_eq!(m.state(), AcquisitionState::Connected);
        assert_eq!(actions, vec![Action::StopSimulator]);
        assert_eq!(m.attempts(), 0);
        assert_eq!(m.last_error(), None);
    }

    #[test]
    fn test_disconnect_schedules_reconnect() {
        let mut m = connected();
        let actions = m.handle(AcquisitionEvent::ChannelClosed);
        assert_eq!(m.state(), AcquisitionState::Reconnecting);
        assert_eq!(
            actions,
            vec![Action::CloseChannel, Action::ScheduleRetry(RECONNECT)]
        );
        assert_eq!(
            m.handle(AcquisitionEvent::RetryElapsed),
            vec![Action::OpenChannel]
        );
        assert_eq!(m.state(), AcquisitionState::Connecting);
    }

    #[test]
    fn test_fatal_fault_goes_to_error() {
        let mut m = connected();
        let actions = m.handle(AcquisitionEvent::ChannelFault {
            fatal: true,
            message: "access denied".into(),
        });
        assert_eq!(m.state(), AcquisitionState::Error);
        assert_eq!(m.last_error(), Some("access denied"));
        assert_eq!(
            actions,
            vec![Action::CloseChannel, Action::ScheduleRetry(RECONNECT)]
        );
    }

    #[test]
    fn test_non_fatal_fault_is_ignored() {
        let mut m = connected();
        let actions = m.handle(AcquisitionEvent::ChannelFault {
            fatal: false,
            message: "read timeout".into(),
        });
        assert!(actions.is_empty());
        assert_eq!(m.state(), AcquisitionState::Connected);
    }

    #[test]
    fn test_admin_enable_simulation_cancels_retry() {
        let mut m = machine();
        m.handle(AcquisitionEvent::Start {
            simulation_mode: false,
        });
        m.handle(AcquisitionEvent::OpenFailed("busy".into()));

        let actions = m.handle(AcquisitionEvent::SetSimulation(true));
        assert_eq!(m.state(), AcquisitionState::Simulating);
        assert_eq!(
            actions,
            vec![
                Action::CancelRetry,
                Action::CloseChannel,
                Action::PersistSimulationMode(true)
            ]
        );
        assert!(m.handle(AcquisitionEvent::RetryElapsed).is_empty());
    }

    #[test]
    fn test_admin_enable_simulation_from_connected() {
        let mut m = connected();
        let actions = m.handle(AcquisitionEvent::SetSimulation(true));
        assert_eq!(
            actions,
            vec![
                Action::CancelRetry,
                Action::CloseChannel,
                Action::StartSimulator,
                Action::PersistSimulationMode(true)
            ]
        );
    }

    #[test]
    fn test_admin_disable_simulation_reconnects() {
        let mut m = machine();
        m.handle(AcquisitionEvent::Start {
            simulation_mode: true,
        });

        let actions = m.handle(AcquisitionEvent::SetSimulation(false));
        assert_eq!(m.state(), AcquisitionState::Connecting);
        assert_eq!(m.attempts(), 0);
        assert_eq!(
            actions,
            vec![
                Action::CancelRetry,
                Action::StopSimulator,
                Action::PersistSimulationMode(false),
                Action::CloseChannel,
                Action::OpenChannel
            ]
        );
    }

    #[test]
    fn test_port_change_reconnects_even_when_connected() {
        let mut m = connected();
        let actions = m.handle(AcquisitionEvent::PortChanged);
        assert_eq!(m.state(), AcquisitionState::Connecting);
        assert_eq!(
            actions,
            vec![
                Action::CancelRetry,
                Action::PersistSimulationMode(false),
                Action::CloseChannel,
                Action::OpenChannel
            ]
        );
    }

    #[test]
    fn test_late_open_success_is_closed() {
        let mut m = machine();
        m.handle(AcquisitionEvent::Start {
            simulation_mode: true,
        });
        assert_eq!(
            m.handle(AcquisitionEvent::OpenSucceeded),
            vec![Action::CloseChannel]
        );
        assert_eq!(m.state(), AcquisitionState::Simulating);
    }

    #[test]
    fn test_exponential_backoff_delays() {
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff_delay: Duration::from_secs(1),
            schedule: freshtrack_core::BackoffSchedule::Exponential,
            max_backoff: Duration::from_secs(10),
        };
        let mut m = AcquisitionMachine::new(policy, RECONNECT);
        m.handle(AcquisitionEvent::Start {
            simulation_mode: false,
        });
        let mut delays = Vec::new();
        for _ in 0..3 {
            for action in m.handle(AcquisitionEvent::OpenFailed("x".into())) {
                if let Action::ScheduleRetry(d) = action {
                    delays.push(d);
                }
            }
            m.handle(AcquisitionEvent::RetryElapsed);
        }
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }
}
