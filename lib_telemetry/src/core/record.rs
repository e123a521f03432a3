//! # Telemetry Record
//!
//! One decoded snapshot of the device's sensor and status fields. Every field
//! is optional: a freshly started station has seen nothing, and a device may
//! omit fields it cannot measure yet (no GPS fix, no battery gauge).

use serde::{Deserialize, Serialize};

/// # Telemetry Record
///
/// Records are never mutated once built. The store swaps whole records, so a
/// reader holding an `Arc<TelemetryRecord>` always sees one consistent frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    /// Device uptime in milliseconds when the frame was produced.
    pub timestamp_ms: Option<u32>,
    /// Acceleration along X in m/s².
    pub accel_x: Option<f64>,
    /// Acceleration along Y in m/s².
    pub accel_y: Option<f64>,
    /// Acceleration along Z in m/s².
    pub accel_z: Option<f64>,
    /// Remaining battery charge in percent.
    pub battery_pct: Option<f64>,
    /// Received signal strength in dBm.
    pub rssi_dbm: Option<f64>,
    /// Number of GNSS satellites in view.
    pub satellite_count: Option<u8>,
    /// Mission clock reported by the device, in seconds.
    pub mission_time_s: Option<f64>,
}

impl TelemetryRecord {
    /// True when no field has been decoded yet.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Magnitude of the acceleration vector, if all three axes are present.
    pub fn accel_magnitude(&self) -> Option<f64> {
        let (x, y, z) = (self.accel_x?, self.accel_y?, self.accel_z?);
        Some((x * x + y * y + z * z).sqrt())
    }
}
