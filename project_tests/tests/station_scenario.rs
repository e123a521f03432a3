use std::io;
use std::time::Duration;

use lib_telemetry::{PortError, PortState, StationEvent, StationSettings};
use project_tests::{battery_record, frame, full_record, mock_station, wait_for};

const PATIENCE: Duration = Duration::from_secs(2);

#[tokio::test]
async fn operator_session_end_to_end() {
    let (station, transport) = mock_station(StationSettings::default(), &["COM1", "COM3"]);
    let device = transport.device("COM3");

    station.open("COM3").await.unwrap();
    assert_eq!(station.console().texts().last().map(String::as_str), Some("opened COM3"));

    assert!(device.send(&frame(&battery_record(87.0))));
    assert!(wait_for(PATIENCE, || station.latest_telemetry().battery_pct == Some(87.0)).await);

    let mut noisy = vec![0x01, 0x02, 0x03];
    noisy.extend_from_slice(&frame(&full_record()));
    assert!(device.send(&noisy));
    assert!(wait_for(PATIENCE, || station.latest_telemetry().satellite_count == Some(9)).await);

    let stats = station.store().stats();
    assert_eq!(stats.records_decoded, 2);
    assert_eq!(stats.parse_errors, 1);
    assert_eq!(station.console().error_count(), 1);

    let status = station.status();
    assert_eq!(status.port.as_deref(), Some("COM3"));
    assert_eq!(status.battery_pct, Some(87.0));
    assert_eq!(status.satellites, Some(9));

    station.close().await.unwrap();
    assert!(!station.is_connected());
    assert_eq!(station.console().texts().last().map(String::as_str), Some("closed COM3"));

    let texts = station.console().texts();
    assert_eq!(texts[0], "Initializing system...");
    assert!(texts.contains(&"telemetry stream acquired on COM3".to_string()));
}

#[tokio::test]
async fn only_one_port_at_a_time() {
    let (station, _transport) = mock_station(StationSettings::default(), &["COM1", "COM3"]);

    station.open("COM1").await.unwrap();
    let err = station.open("COM3").await.unwrap_err();
    assert_eq!(err.to_string(), "cannot open COM3: COM1 is already open");

    let states: Vec<PortState> = station.ports().into_iter().map(|port| port.state).collect();
    assert_eq!(states, vec![PortState::Open, PortState::Closed]);

    station.close().await.unwrap();
    station.open("COM3").await.unwrap();
    assert_eq!(station.status().port.as_deref(), Some("COM3"));
    station.shutdown().await;
    assert!(!station.is_connected());
}

#[tokio::test]
async fn unplugged_device_closes_the_session() {
    let (station, transport) = mock_station(StationSettings::default(), &["COM3"]);
    let mut events = station.subscribe();

    station.open("COM3").await.unwrap();
    assert!(transport.device("COM3").unplug());
    assert!(wait_for(PATIENCE, || !station.is_connected()).await);

    let texts = station.console().texts();
    let tail = &texts[texts.len() - 2..];
    assert!(tail[0].starts_with("COM3 disconnected"), "{}", tail[0]);
    assert_eq!(tail[1], "closed COM3");

    let mut closed_seen = false;
    while let Some(event) = events.try_recv() {
        if let StationEvent::PortChanged { port_id, state: PortState::Closed } = event {
            closed_seen |= port_id == "COM3";
        }
    }
    assert!(closed_seen);

    // The port can be reopened after the disconnect.
    station.open("COM3").await.unwrap();
    assert_eq!(transport.open_count("COM3"), 2);
    station.close().await.unwrap();
}

#[tokio::test]
async fn read_failure_is_reported_once() {
    let (station, transport) = mock_station(StationSettings::default(), &["COM3"]);

    station.open("COM3").await.unwrap();
    assert!(transport.device("COM3").fail(io::ErrorKind::BrokenPipe, "cable fault"));
    assert!(wait_for(PATIENCE, || !station.is_connected()).await);

    assert_eq!(station.console().texts().last().map(String::as_str), Some("closed COM3"));

    // A later close has nothing to close and logs nothing.
    let before = station.console().len();
    station.close().await.unwrap();
    assert_eq!(station.console().len(), before);
    assert_eq!(station.console().error_count(), 1);
}

#[tokio::test]
async fn missing_port_is_reported_on_the_console() {
    let (station, _transport) = mock_station(StationSettings::default(), &["COM3"]);

    let err = station.open("COM7").await.unwrap_err();
    assert!(matches!(err, PortError::PortUnavailable { .. }));
    assert_eq!(station.console().error_count(), 1);
    assert!(!station.status().connected());
}
