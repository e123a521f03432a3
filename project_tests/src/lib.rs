//! # Shared Fixtures
//!
//! Builders used by the integration tests under `tests/` and by the
//! simulator runner.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use lib_telemetry::codec::{encode_frame, Crc16};
use lib_telemetry::ports::MockTransport;
use lib_telemetry::{Capabilities, GroundStation, StationSettings, TelemetryRecord};

/// A record with every field present.
pub fn full_record() -> TelemetryRecord {
    TelemetryRecord {
        timestamp_ms: Some(12_345),
        accel_x: Some(0.12),
        accel_y: Some(-0.05),
        accel_z: Some(9.81),
        battery_pct: Some(87.0),
        rssi_dbm: Some(-72.5),
        satellite_count: Some(9),
        mission_time_s: Some(12.3),
    }
}

/// A record carrying only a battery reading.
pub fn battery_record(pct: f64) -> TelemetryRecord {
    TelemetryRecord {
        battery_pct: Some(pct),
        ..Default::default()
    }
}

/// `record` encoded as one CRC-16 frame.
pub fn frame(record: &TelemetryRecord) -> Bytes {
    encode_frame(record, &Crc16)
}

/// A station over a mock transport exposing `ports`.
pub fn mock_station(settings: StationSettings, ports: &[&str]) -> (GroundStation, MockTransport) {
    let transport = MockTransport::with_ports(ports.iter().copied());
    let caps = Capabilities::detect(&settings);
    let station = GroundStation::new(settings, Arc::new(transport.clone()), caps)
        .expect("fixture settings are valid");
    (station, transport)
}

/// Polls `condition` every 5ms until it holds or `timeout` elapses.
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
