//! Integration tests for the simulated devices.

use freshtrack_core::{FaultKind, FreshError, LinkOpener};
use freshtrack_driver_sim::*;

/// Climate readings stay in the configured band for a long run
#[test]
fn test_climate_long_run_in_band() {
    let profile = ClimateProfile {
        nominal_temperature: -18.0,
        temperature_min: -22.0,
        temperature_max: -15.0,
        ..ClimateProfile::default()
    };
    assert!(profile.validate().is_ok());

    let climate = SimulatedClimate::new(profile, Some(2024));
    for _ in 0..5_000 {
        let (t, h) = climate.next_reading();
        assert!((-22.0..=-15.0).contains(&t));
        assert!((45.0..=75.0).contains(&h));
    }
}

/// Unseeded climates still produce plausible values
#[test]
fn test_unseeded_climate() {
    let climate = SimulatedClimate::new(ClimateProfile::default(), None);
    let (t, _) = climate.next_reading();
    assert!((2.0..=12.0).contains(&t));
}

/// Scripted opener records every request
#[tokio::test]
async fn test_open_requests_are_recorded() {
    let opener = ScriptedLinkOpener::always_failing();
    assert!(opener.open("COM7", 9600).await.is_err());
    assert!(opener.open("/dev/ttyACM0", 115_200).await.is_err());

    assert_eq!(
        opener.requests(),
        vec![
            OpenRequest {
                path: "COM7".into(),
                baud_rate: 9600
            },
            OpenRequest {
                path: "/dev/ttyACM0".into(),
                baud_rate: 115_200
            },
        ]
    );
}

/// Scripts pushed after construction are used in order
#[tokio::test]
async fn test_pushed_scripts() {
    let opener = ScriptedLinkOpener::default();
    opener.push(LinkScript::Connect(vec![
        LinkStep::Line("Temp: 3.1".into()),
        LinkStep::Fault(FaultKind::Timeout),
        LinkStep::Line("Hum: 55".into()),
        LinkStep::Close,
    ]));

    let mut source = opener.open("COM7", 9600).await.unwrap();
    assert_eq!(source.next_line().await.unwrap().as_deref(), Some("Temp: 3.1"));

    let fault = source.next_line().await.unwrap_err();
    assert!(matches!(
        fault,
        FreshError::ChannelFault {
            kind: FaultKind::Timeout,
            ..
        }
    ));
    assert!(!fault.is_fatal_fault());

    assert_eq!(source.next_line().await.unwrap().as_deref(), Some("Hum: 55"));
    assert_eq!(source.next_line().await.unwrap(), None);
}
