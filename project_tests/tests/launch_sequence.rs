use std::io::Write;
use std::time::Duration;

use lib_telemetry::{
    ConfigError, LaunchError, LaunchMode, LaunchState, StationEvent, StationSettings, TelemetryCondition,
    TelemetryRecord,
};
use project_tests::{frame, mock_station, wait_for};
use serde_json::json;

fn mock_settings() -> StationSettings {
    StationSettings {
        launch_mode: LaunchMode::Mock,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn mock_countdown_runs_to_completion() {
    let (station, _transport) = mock_station(mock_settings(), &[]);
    let mut events = station.subscribe();

    let run = station.start_launch().unwrap();
    assert!(station.is_running());
    assert_eq!(run.finished().await, LaunchState::Complete);
    assert!(!station.is_running());

    let texts = station.console().texts();
    assert_eq!(texts.len(), 1 + run.script().len());
    assert_eq!(texts[1], "Initializing launch sequence...");
    assert_eq!(texts.last().map(String::as_str), Some("Launch sequence complete"));

    let mission_clock = station.status().mission_clock.unwrap();
    assert!(mission_clock >= Duration::from_secs(4) && mission_clock < Duration::from_secs(5));

    let mut states = Vec::new();
    while let Some(event) = events.try_recv() {
        if let StationEvent::LaunchChanged(state) = event {
            states.push(state);
        }
    }
    assert_eq!(states, vec![LaunchState::Running, LaunchState::Complete]);
}

#[tokio::test(start_paused = true)]
async fn two_runs_fire_identically() {
    let mut timelines = Vec::new();
    for _ in 0..2 {
        let (station, _transport) = mock_station(mock_settings(), &[]);
        let run = station.start_launch().unwrap();
        run.finished().await;
        timelines.push(run.fired_steps());
    }
    assert_eq!(timelines[0], timelines[1]);
    assert_eq!(timelines[0].len(), 10);
}

#[tokio::test(start_paused = true)]
async fn abort_mid_countdown() {
    let (station, _transport) = mock_station(mock_settings(), &[]);
    let run = station.start_launch().unwrap();

    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert!(station.abort_launch());
    assert_eq!(station.launch_state(), LaunchState::Aborted);

    let fired = run.fired_steps().len();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(run.fired_steps().len(), fired);
    assert_eq!(
        station.console().texts().last().map(String::as_str),
        Some("Launch sequence aborted")
    );
    assert!(!station.abort_launch());
}

#[tokio::test(start_paused = true)]
async fn restart_while_running_is_refused_but_allowed_after() {
    let (station, _transport) = mock_station(mock_settings(), &[]);
    let first = station.start_launch().unwrap();

    assert_eq!(station.start_launch().err(), Some(LaunchError::AlreadyRunning));
    assert_eq!(station.console().error_count(), 1);

    first.finished().await;
    let second = station.start_launch().unwrap();
    assert_eq!(second.finished().await, LaunchState::Complete);
    assert_eq!(station.current_run().map(|run| run.fired_steps().len()), Some(10));
}

#[tokio::test]
async fn live_run_waits_for_telemetry() {
    let steps = json!([
        {"offsetMs": 0, "text": "Arming igniter"},
        {"offsetMs": 20, "text": "Ignition", "effect": "liftoff"},
        {"offsetMs": 40, "text": "Liftoff confirmed"}
    ]);
    let mut script = tempfile::NamedTempFile::new().unwrap();
    script.write_all(steps.to_string().as_bytes()).unwrap();

    let settings = StationSettings {
        launch_mode: LaunchMode::Live,
        launch_script: Some(script.path().to_path_buf()),
        live_conditions: vec![None, Some(TelemetryCondition::SatellitesAtLeast { count: 6 }), None],
        ..Default::default()
    };
    let (station, transport) = mock_station(settings, &["COM3"]);
    station.open("COM3").await.unwrap();

    let run = station.start_launch().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(run.fired_steps().len(), 1);
    assert!(station.is_running());

    let lock = TelemetryRecord {
        satellite_count: Some(8),
        ..Default::default()
    };
    assert!(transport.device("COM3").send(&frame(&lock)));
    assert!(wait_for(Duration::from_secs(2), || run.state() == LaunchState::Complete).await);

    let texts: Vec<String> = run.fired_steps().into_iter().map(|step| step.text).collect();
    assert_eq!(texts, vec!["Arming igniter", "Ignition", "Liftoff confirmed"]);
    assert!(run.mission_elapsed().is_some());
    station.close().await.unwrap();
}

#[test]
fn conditions_must_line_up_with_the_script() {
    let settings = StationSettings {
        live_conditions: vec![None; 3],
        ..Default::default()
    };
    assert!(matches!(
        settings.load_launch_script(),
        Err(ConfigError::Script(LaunchError::TriggerMismatch { steps: 10, conditions: 3 }))
    ));
}
