//! Sensor acquisition against scripted hardware links.
//!
//! Every test runs on a paused clock: retry and reconnect delays elapse as soon
//! as the runtime is idle.

use freshtrack::acquisition::{
    AcquiredSample, AcquisitionSettings, AcquisitionState, AcquisitionStatus, SensorAcquisition,
};
use freshtrack::store::{MemorySettingsStore, MemoryTemperatureLog};
use freshtrack_core::{
    settings_keys, AlertLevel, FaultKind, FreshError, RetryPolicy, SampleSource, SettingsStore,
};
use freshtrack_driver_sim::{LinkScript, LinkStep, ScriptedLinkOpener};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_test::traced_test;

const WAIT: Duration = Duration::from_secs(600);

struct Harness {
    acquisition: SensorAcquisition,
    opener: ScriptedLinkOpener,
    settings: Arc<MemorySettingsStore>,
    log: Arc<MemoryTemperatureLog>,
}

fn acquisition_settings() -> AcquisitionSettings {
    AcquisitionSettings {
        retry: RetryPolicy::fixed(3, Duration::from_secs(5)),
        seed: Some(7),
        ..AcquisitionSettings::default()
    }
}

async fn start(opener: ScriptedLinkOpener, simulation_mode: bool) -> Harness {
    start_with_settings(opener, MemorySettingsStore::new(), simulation_mode).await
}

async fn start_with_settings(
    opener: ScriptedLinkOpener,
    settings: MemorySettingsStore,
    simulation_mode: bool,
) -> Harness {
    let settings = Arc::new(settings);
    let log = Arc::new(MemoryTemperatureLog::new(100));
    let acquisition = SensorAcquisition::builder(acquisition_settings())
        .opener(Arc::new(opener.clone()))
        .settings_store(settings.clone())
        .temperature_log(log.clone())
        .simulation_mode(simulation_mode)
        .spawn()
        .await
        .unwrap();
    Harness {
        acquisition,
        opener,
        settings,
        log,
    }
}

async fn wait_for(
    acquisition: &SensorAcquisition,
    mut predicate: impl FnMut(&AcquisitionStatus) -> bool,
) -> AcquisitionStatus {
    let mut updates = acquisition.status_updates();
    let status = tokio::time::timeout(WAIT, updates.wait_for(|s| predicate(s)))
        .await
        .expect("status never matched")
        .expect("acquisition task stopped")
        .clone();
    status
}

async fn next_from(
    samples: &mut broadcast::Receiver<AcquiredSample>,
    source: SampleSource,
) -> AcquiredSample {
    tokio::time::timeout(WAIT, async {
        loop {
            let received = samples.recv().await.expect("sample stream closed");
            if received.sample.source == source {
                return received;
            }
        }
    })
    .await
    .expect("no sample from the expected source")
}

async fn stored(settings: &MemorySettingsStore, key: &str) -> Option<String> {
    settings.get(key).await.unwrap()
}

fn connect(steps: Vec<LinkStep>) -> LinkScript {
    LinkScript::Connect(steps)
}

fn line(text: &str) -> LinkStep {
    LinkStep::Line(text.to_string())
}

#[tokio::test(start_paused = true)]
async fn test_three_failures_fall_back_to_simulation() {
    let h = start(ScriptedLinkOpener::always_failing(), false).await;

    let status = wait_for(&h.acquisition, |s| {
        s.state == AcquisitionState::Simulating && s.simulation_mode
    })
    .await;

    assert_eq!(h.opener.open_count(), 3);
    assert_eq!(status.attempts, 3);
    assert!(status.simulation_active);
    assert_eq!(status.label(), "Simulation");
    assert_eq!(
        stored(&h.settings, settings_keys::SIMULATION_MODE).await.as_deref(),
        Some("true")
    );

    // No further hardware attempts once the fallback is permanent.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.opener.open_count(), 3);
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_first_failure_starts_temporary_simulation() {
    let opener = ScriptedLinkOpener::new([
        LinkScript::FailOpen("port busy".into()),
        connect(vec![line("Temp: 3.0 Hum: 40")]),
    ]);
    let h = start(opener, false).await;
    let mut samples = h.acquisition.subscribe();

    let status = wait_for(&h.acquisition, |s| s.state == AcquisitionState::Error).await;
    assert!(status.simulation_active);
    assert!(!status.simulation_mode, "temporary simulation is not persisted");
    assert!(status.label().starts_with("Error: "));
    assert!(status.label().contains("port busy"));

    let simulated = next_from(&mut samples, SampleSource::Simulation).await;
    assert!((2.0..=12.0).contains(&simulated.sample.temperature));

    let sensor = next_from(&mut samples, SampleSource::Sensor).await;
    assert_eq!(sensor.sample.temperature, 3.0);
    assert_eq!(sensor.sample.humidity, 40.0);

    let status = h.acquisition.status();
    assert_eq!(status.state, AcquisitionState::Connected);
    assert!(!status.simulation_active);
    assert_eq!(status.attempts, 0);
    assert_eq!(status.last_error, None);
    assert_eq!(stored(&h.settings, settings_keys::SIMULATION_MODE).await, None);
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_out_of_range_sample_is_discarded() {
    let opener = ScriptedLinkOpener::new([connect(vec![
        line("Temp: 150 Hum: 50"),
        line("Temp: 4.5 Hum: 50"),
    ])]);
    let h = start(opener, false).await;
    let mut samples = h.acquisition.subscribe();

    let first = next_from(&mut samples, SampleSource::Sensor).await;
    assert_eq!(first.sample.temperature, 4.5);
    assert_eq!(h.acquisition.latest().temperature, 4.5);
    assert_eq!(h.log.len(), 1);
    assert!(logs_contain("Discarding out-of-range sample"));
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_rejected_sample_never_replaces_latest() {
    let opener = ScriptedLinkOpener::new([connect(vec![line("Temp: 150")])]);
    let h = start(opener, false).await;

    wait_for(&h.acquisition, |s| s.state == AcquisitionState::Connected).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let latest = h.acquisition.latest();
    assert_eq!(latest.source, SampleSource::Initial);
    assert_eq!(latest.temperature, 22.0);
    assert!(h.log.is_empty());
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_unparseable_lines_are_skipped() {
    let opener = ScriptedLinkOpener::new([connect(vec![
        line("DHT22 init ok"),
        line(r#"{"humidity": 70}"#),
        line("Temp: 5.5"),
    ])]);
    let h = start(opener, false).await;
    let mut samples = h.acquisition.subscribe();

    // Humidity-only line keeps the previous temperature (initial 22 °C).
    let first = next_from(&mut samples, SampleSource::Sensor).await;
    assert_eq!((first.sample.temperature, first.sample.humidity), (22.0, 70.0));
    let second = next_from(&mut samples, SampleSource::Sensor).await;
    assert_eq!((second.sample.temperature, second.sample.humidity), (5.5, 70.0));

    assert!(logs_contain("Discarding unparseable line"));
    assert_eq!(h.acquisition.status().state, AcquisitionState::Connected);
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_samples_arrive_in_order_with_alerts() {
    let opener = ScriptedLinkOpener::new([connect(vec![
        line("Temp: 4.0"),
        line("Temp: 25.0"),
        line("Temp: 28.5"),
        line("Temp: 6.0"),
    ])]);
    let h = start(opener, false).await;
    let mut samples = h.acquisition.subscribe();

    let mut seen = Vec::new();
    for _ in 0..4 {
        let s = next_from(&mut samples, SampleSource::Sensor).await;
        seen.push((s.sample.temperature, s.alert));
    }
    assert_eq!(
        seen,
        vec![
            (4.0, AlertLevel::None),
            (25.0, AlertLevel::Warning),
            (28.5, AlertLevel::Critical),
            (6.0, AlertLevel::None),
        ]
    );
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_reconnects() {
    let opener = ScriptedLinkOpener::new([
        connect(vec![line("Temp: 4.0"), LinkStep::Close]),
        connect(vec![line("Temp: 5.0")]),
    ]);
    let h = start(opener, false).await;
    let mut samples = h.acquisition.subscribe();

    assert_eq!(next_from(&mut samples, SampleSource::Sensor).await.sample.temperature, 4.0);
    assert_eq!(next_from(&mut samples, SampleSource::Sensor).await.sample.temperature, 5.0);

    assert_eq!(h.opener.open_count(), 2);
    let status = h.acquisition.status();
    assert_eq!(status.state, AcquisitionState::Connected);
    assert!(!status.simulation_active, "reconnect does not start the simulator");
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_fatal_fault_reconnects() {
    let opener = ScriptedLinkOpener::new([
        connect(vec![line("Temp: 4.0"), LinkStep::Fault(FaultKind::Permission)]),
        connect(vec![line("Temp: 6.0")]),
    ]);
    let h = start(opener, false).await;
    let mut samples = h.acquisition.subscribe();

    assert_eq!(next_from(&mut samples, SampleSource::Sensor).await.sample.temperature, 4.0);
    let status = wait_for(&h.acquisition, |s| s.state == AcquisitionState::Error).await;
    assert!(status.label().contains("permission"));

    assert_eq!(next_from(&mut samples, SampleSource::Sensor).await.sample.temperature, 6.0);
    assert_eq!(h.opener.open_count(), 2);
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_recoverable_fault_keeps_connection() {
    let opener = ScriptedLinkOpener::new([connect(vec![
        LinkStep::Fault(FaultKind::Timeout),
        line("Temp: 4.0"),
    ])]);
    let h = start(opener, false).await;
    let mut samples = h.acquisition.subscribe();

    assert_eq!(next_from(&mut samples, SampleSource::Sensor).await.sample.temperature, 4.0);
    assert_eq!(h.opener.open_count(), 1);
    assert_eq!(h.acquisition.status().state, AcquisitionState::Connected);
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_open_timeout_counts_as_failure() {
    let opener = ScriptedLinkOpener::new([
        LinkScript::HangOnOpen,
        connect(vec![line("Temp: 4.0")]),
    ]);
    let h = start(opener, false).await;

    let status = wait_for(&h.acquisition, |s| s.state == AcquisitionState::Error).await;
    assert_eq!(status.attempts, 1);
    assert!(status.label().contains("Timed out"));

    wait_for(&h.acquisition, |s| s.state == AcquisitionState::Connected).await;
    assert_eq!(h.opener.open_count(), 2);
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_admin_toggles() {
    let opener = ScriptedLinkOpener::new([connect(vec![])]);
    let h = start(opener, false).await;
    wait_for(&h.acquisition, |s| s.state == AcquisitionState::Connected).await;

    let status = h.acquisition.set_simulation_mode(true).await.unwrap();
    assert_eq!(status.state, AcquisitionState::Simulating);
    assert!(status.simulation_mode);
    assert_eq!(
        stored(&h.settings, settings_keys::SIMULATION_MODE).await.as_deref(),
        Some("true")
    );

    let mut samples = h.acquisition.subscribe();
    next_from(&mut samples, SampleSource::Simulation).await;

    h.opener.push(connect(vec![line("Temp: 3.3")]));
    let status = h.acquisition.set_simulation_mode(false).await.unwrap();
    assert_eq!(status.state, AcquisitionState::Connected);
    assert!(!status.simulation_mode);
    assert_eq!(status.attempts, 0);
    assert_eq!(
        stored(&h.settings, settings_keys::SIMULATION_MODE).await.as_deref(),
        Some("false")
    );
    assert_eq!(next_from(&mut samples, SampleSource::Sensor).await.sample.temperature, 3.3);
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_admin_toggle_cancels_pending_retry() {
    let h = start(ScriptedLinkOpener::always_failing(), false).await;
    wait_for(&h.acquisition, |s| s.state == AcquisitionState::Error).await;
    assert_eq!(h.opener.open_count(), 1);

    h.acquisition.set_simulation_mode(true).await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(h.opener.open_count(), 1, "cancelled retry must not fire");
    assert_eq!(h.acquisition.status().state, AcquisitionState::Simulating);
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_change_serial_port() {
    let opener = ScriptedLinkOpener::new([connect(vec![line("Temp: 4.0")])]);
    let h = start(opener, true).await;
    assert_eq!(h.opener.open_count(), 0);

    let status = h.acquisition.change_serial_port("/dev/ttyUSB3").await.unwrap();
    assert_eq!(status.state, AcquisitionState::Connected);
    assert_eq!(status.serial_port, "/dev/ttyUSB3");
    assert!(!status.simulation_mode);

    assert_eq!(h.opener.requests()[0].path, "/dev/ttyUSB3");
    assert_eq!(
        stored(&h.settings, settings_keys::SERIAL_PORT).await.as_deref(),
        Some("/dev/ttyUSB3")
    );
    assert_eq!(
        stored(&h.settings, settings_keys::SIMULATION_MODE).await.as_deref(),
        Some("false")
    );

    let err = h.acquisition.change_serial_port("  ").await.unwrap_err();
    assert!(matches!(err, FreshError::Configuration(_)));
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stored_settings_win_over_builder() {
    let settings = MemorySettingsStore::with_values([
        (settings_keys::SIMULATION_MODE, "true"),
        (settings_keys::SERIAL_PORT, "/dev/ttyACM1"),
    ]);
    let h = start_with_settings(ScriptedLinkOpener::always_failing(), settings, false).await;

    let status = wait_for(&h.acquisition, |s| s.state == AcquisitionState::Simulating).await;
    assert_eq!(status.serial_port, "/dev/ttyACM1");
    assert!(status.simulation_mode);
    assert_eq!(h.opener.open_count(), 0);
    h.acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_forced_simulation_is_not_persisted() {
    let settings = Arc::new(MemorySettingsStore::with_values([(
        settings_keys::SIMULATION_MODE,
        "false",
    )]));
    let opener = ScriptedLinkOpener::always_failing();
    let acquisition = SensorAcquisition::builder(acquisition_settings())
        .opener(Arc::new(opener.clone()))
        .settings_store(settings.clone())
        .temperature_log(Arc::new(MemoryTemperatureLog::new(10)))
        .force_simulation(true)
        .spawn()
        .await
        .unwrap();

    let status = wait_for(&acquisition, |s| s.state == AcquisitionState::Simulating).await;
    assert!(status.simulation_active);
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(opener.open_count(), 0);
    assert_eq!(
        stored(&settings, settings_keys::SIMULATION_MODE).await.as_deref(),
        Some("false")
    );
    acquisition.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_commands_after_shutdown_fail() {
    let h = start(ScriptedLinkOpener::always_failing(), true).await;
    h.acquisition.shutdown().await;

    let err = h.acquisition.set_simulation_mode(false).await.unwrap_err();
    assert!(matches!(err, FreshError::AcquisitionStopped));
}
