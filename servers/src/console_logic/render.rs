use std::time::Duration;

use colored::Colorize;
use lib_telemetry::{ConsoleEntry, ConsoleLevel, Port, PortState, StationStatus, TelemetryRecord};

/// Formats a duration as HH:MM:SS.
pub fn format_clock(dur: Duration) -> String {
    let total_secs = dur.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// A console entry as printed: info in green, errors in red.
pub fn console_line(entry: &ConsoleEntry) -> String {
    let line = entry.to_string();
    match entry.level {
        ConsoleLevel::Info => line.green().to_string(),
        ConsoleLevel::Error => line.red().to_string(),
    }
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "--".to_string(), |v| v.to_string())
}

/// The status bar: mission clock, satellites, link, signal, battery, launch.
pub fn status_line(status: &StationStatus) -> String {
    let link = match &status.port {
        Some(port) => format!("CONNECTED ({port})"),
        None => "DISCONNECTED".to_string(),
    };
    format!(
        "T+{} | SAT {} | {} | RSSI {} dBm | BAT {}% | {} | frames {} ok / {} bad",
        status.mission_clock.map_or_else(|| "--:--:--".to_string(), format_clock),
        or_dash(status.satellites),
        link,
        or_dash(status.rssi_dbm.map(|v| format!("{v:.1}"))),
        or_dash(status.battery_pct.map(|v| format!("{v:.0}"))),
        status.launch_state,
        status.stats.records_decoded,
        status.stats.parse_errors,
    )
}

/// One decoded record, for the parsed-data view.
pub fn telemetry_line(record: &TelemetryRecord) -> String {
    let fmt = |v: Option<f64>| or_dash(v.map(|v| format!("{v:.2}")));
    format!(
        "  [data] t={}ms ax={} ay={} az={} bat={} rssi={} sats={} mt={}",
        or_dash(record.timestamp_ms),
        fmt(record.accel_x),
        fmt(record.accel_y),
        fmt(record.accel_z),
        fmt(record.battery_pct),
        fmt(record.rssi_dbm),
        or_dash(record.satellite_count),
        fmt(record.mission_time_s),
    )
}

/// The port list as printed by `ports`.
pub fn ports_table(ports: &[Port]) -> String {
    if ports.is_empty() {
        return "No ports found".to_string();
    }
    ports
        .iter()
        .map(|port| {
            let state = match port.state {
                PortState::Open => port.state.to_string().green(),
                PortState::Error => port.state.to_string().red(),
                PortState::Closed => port.state.to_string().normal(),
            };
            format!("  {:<16} {:<7} {}", port.id, state, port.display_name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_telemetry::{LaunchState, TelemetryStats};

    #[test]
    fn clock_is_zero_padded() {
        assert_eq!(format_clock(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_clock(Duration::from_millis(3_723_900)), "01:02:03");
    }

    #[test]
    fn status_line_shows_every_field() {
        let status = StationStatus {
            mission_clock: Some(Duration::from_secs(83)),
            satellites: Some(9),
            port: Some("COM3".into()),
            rssi_dbm: Some(-72.5),
            battery_pct: Some(87.0),
            launch_state: LaunchState::Running,
            stats: TelemetryStats {
                records_decoded: 10,
                parse_errors: 1,
            },
        };
        assert_eq!(
            status_line(&status),
            "T+00:01:23 | SAT 9 | CONNECTED (COM3) | RSSI -72.5 dBm | BAT 87% | RUNNING | frames 10 ok / 1 bad"
        );
    }

    #[test]
    fn status_line_before_any_data() {
        let status = StationStatus {
            mission_clock: None,
            satellites: None,
            port: None,
            rssi_dbm: None,
            battery_pct: None,
            launch_state: LaunchState::Idle,
            stats: TelemetryStats::default(),
        };
        assert!(status_line(&status).starts_with("T+--:--:-- | SAT -- | DISCONNECTED"));
    }

    #[test]
    fn telemetry_line_marks_missing_fields() {
        let record = TelemetryRecord {
            battery_pct: Some(87.0),
            ..Default::default()
        };
        let line = telemetry_line(&record);
        assert!(line.contains("bat=87.00"));
        assert!(line.contains("sats=--"));
    }
}
