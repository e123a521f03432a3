//! # Simulator Link Test
//!
//! Opens the built-in simulator port through a full ground station, streams
//! telemetry for a few seconds with periodic corruption, then prints the
//! console transcript and decoder statistics.

use std::sync::Arc;
use std::time::Duration;

use lib_telemetry::ports::SIM_PORT_ID;
use lib_telemetry::{GroundStation, StationEvent, StationSettings};

/// Streams SIM0 for three seconds.
///
/// // Statement: Exits non-zero when no record was decoded.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = StationSettings {
        simulator: true,
        simulator_rate_hz: 20.0,
        simulator_corrupt_every: Some(7),
        ..Default::default()
    };
    let station = Arc::new(GroundStation::with_default_transports(settings)?);
    let mut events = station.subscribe();

    println!("[*] Ports:");
    for port in station.ports() {
        println!("    {:<16} {}", port.id, port.display_name);
    }

    station.open(SIM_PORT_ID).await?;
    println!("[*] Streaming {} for 3 seconds...", SIM_PORT_ID);

    let deadline = tokio::time::sleep(Duration::from_secs(3));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Some(StationEvent::TelemetryUpdated(record)) => println!(
                    "    t={:?}ms az={:?} sats={:?} bat={:?}",
                    record.timestamp_ms, record.accel_z, record.satellite_count, record.battery_pct
                ),
                Some(_) => {}
                None => break,
            },
        }
    }

    station.shutdown().await;

    println!("\n[*] Console transcript:");
    println!("-----------------------------------------------");
    for entry in station.console().entries() {
        println!("{}", entry);
    }
    println!("-----------------------------------------------");

    let stats = station.store().stats();
    println!("[INFO] {} records decoded, {} frames rejected", stats.records_decoded, stats.parse_errors);
    if stats.records_decoded == 0 {
        eprintln!("\n[ERROR] No telemetry decoded from {}", SIM_PORT_ID);
        std::process::exit(1);
    }
    Ok(())
}
