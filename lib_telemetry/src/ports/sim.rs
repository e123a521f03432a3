//! # Telemetry Simulator
//!
//! A transport exposing one virtual port, `SIM0`, that streams encoded frames
//! at a fixed rate. The flight profile is a coarse pad, boost, coast model
//! with seeded noise, so two runs with the same seed emit identical bytes.
//! Optional periodic corruption exercises the parser's resynchronization.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Buf, Bytes};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::codec::{encode_frame, ChecksumKind, FrameCheck, FRAME_LEN};
use crate::core::TelemetryRecord;
use crate::ports::transport::{ByteStream, PortInfo, SerialTransport, TransportError};

/// Identifier of the simulated port.
pub const SIM_PORT_ID: &str = "SIM0";

/// Longest a simulated read blocks before reporting `TimedOut`.
const SIM_READ_TIMEOUT: Duration = Duration::from_millis(100);

const GRAVITY: f64 = 9.81;
const LIFTOFF_AFTER_S: f64 = 10.0;
const BURN_S: f64 = 3.0;
const BOOST_ACCEL: f64 = 35.0;

/// Simulator settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimConfig {
    /// Frames per second.
    pub rate_hz: f64,
    /// Seed for the noise generator.
    pub seed: u64,
    /// Corrupt every n-th frame (one flipped payload byte).
    pub corrupt_every: Option<u32>,
    /// Integrity policy used to encode frames.
    pub checksum: ChecksumKind,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            rate_hz: 10.0,
            seed: 0x5EED,
            corrupt_every: None,
            checksum: ChecksumKind::default(),
        }
    }
}

/// # Simulator Transport
#[derive(Debug, Clone, Default)]
pub struct SimTransport {
    config: SimConfig,
}

impl SimTransport {
    /// Creates a simulator with `config`.
    pub fn new(config: SimConfig) -> Self {
        Self { config }
    }

    /// The active settings.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }
}

impl SerialTransport for SimTransport {
    fn enumerate(&self) -> Result<Vec<PortInfo>, TransportError> {
        Ok(vec![PortInfo::new(SIM_PORT_ID, "Telemetry simulator")])
    }

    fn open(&self, port_id: &str) -> Result<ByteStream, TransportError> {
        if port_id != SIM_PORT_ID {
            return Err(TransportError::NotFound);
        }
        if !(self.config.rate_hz.is_finite() && self.config.rate_hz > 0.0) {
            return Err(TransportError::Refused(format!(
                "invalid simulator rate {} Hz",
                self.config.rate_hz
            )));
        }
        log::info!(
            "Simulator streaming at {} Hz (seed {:#x})",
            self.config.rate_hz,
            self.config.seed
        );
        Ok(Box::new(SimStream::new(self.config)))
    }
}

/// Generates the frame sequence without pacing.
#[derive(Debug)]
pub struct FlightProfile {
    rng: StdRng,
    check: Arc<dyn FrameCheck>,
    interval_s: f64,
    corrupt_every: Option<u32>,
    frame_index: u64,
    satellites: u8,
}

impl FlightProfile {
    /// Creates a profile emitting frames `1 / rate_hz` seconds apart.
    pub fn new(config: SimConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            check: config.checksum.policy(),
            interval_s: 1.0 / config.rate_hz,
            corrupt_every: config.corrupt_every.filter(|n| *n > 0),
            frame_index: 0,
            satellites: 6,
        }
    }

    /// The record for the next frame.
    pub fn next_record(&mut self) -> TelemetryRecord {
        let t = self.frame_index as f64 * self.interval_s;
        self.frame_index += 1;
        let flight = t - LIFTOFF_AFTER_S;

        let thrust = if (0.0..BURN_S).contains(&flight) { BOOST_ACCEL } else { 0.0 };
        let on_pad = flight < 0.0;
        let accel_z = if on_pad { GRAVITY } else { thrust - GRAVITY };

        if self.rng.random_range(0..20) == 0 {
            self.satellites = self.rng.random_range(6..=12);
        }

        TelemetryRecord {
            timestamp_ms: Some((t * 1000.0) as u32),
            accel_x: Some(self.noise(0.05)),
            accel_y: Some(self.noise(0.05)),
            accel_z: Some(accel_z + self.noise(0.2)),
            battery_pct: Some((100.0 - t * 0.02).max(0.0)),
            rssi_dbm: Some((-60.0 - flight.max(0.0) * 1.5 + self.noise(1.0)).max(-120.0)),
            satellite_count: Some(self.satellites),
            mission_time_s: Some(flight.max(0.0)),
        }
    }

    /// The next encoded frame, corrupted when it falls on the corruption
    /// period.
    pub fn next_frame(&mut self) -> Bytes {
        let record = self.next_record();
        let frame = encode_frame(&record, self.check.as_ref());

        match self.corrupt_every {
            Some(n) if self.frame_index % u64::from(n) == 0 => {
                let mut damaged = frame.to_vec();
                // Flip a payload bit; the marker and length byte stay intact.
                let at = self.rng.random_range(3..FRAME_LEN - 2);
                damaged[at] ^= 0x01;
                Bytes::from(damaged)
            }
            _ => frame,
        }
    }

    fn noise(&mut self, amplitude: f64) -> f64 {
        self.rng.random_range(-amplitude..=amplitude)
    }
}

struct SimStream {
    profile: FlightProfile,
    interval: Duration,
    next_due: Instant,
    pending: Bytes,
}

impl SimStream {
    fn new(config: SimConfig) -> Self {
        Self {
            profile: FlightProfile::new(config),
            interval: Duration::from_secs_f64(1.0 / config.rate_hz),
            next_due: Instant::now(),
            pending: Bytes::new(),
        }
    }
}

impl Read for SimStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            let wait = self.next_due.saturating_duration_since(Instant::now());
            if wait > SIM_READ_TIMEOUT {
                std::thread::sleep(SIM_READ_TIMEOUT);
                return Err(io::Error::new(io::ErrorKind::TimedOut, "waiting for next frame"));
            }
            std::thread::sleep(wait);
            self.pending = self.profile.next_frame();
            self.next_due += self.interval;
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FrameParser, ParseEvent};

    #[test]
    fn same_seed_same_bytes() {
        let config = SimConfig::default();
        let mut a = FlightProfile::new(config);
        let mut b = FlightProfile::new(config);
        for _ in 0..50 {
            assert_eq!(a.next_frame(), b.next_frame());
        }
    }

    #[test]
    fn frames_decode_cleanly() {
        let mut profile = FlightProfile::new(SimConfig::default());
        let mut parser = FrameParser::default();
        for _ in 0..20 {
            let events = parser.feed(&profile.next_frame());
            assert!(matches!(events.as_slice(), [ParseEvent::Record(_)]));
        }
    }

    #[test]
    fn corruption_period_is_honoured() {
        let mut profile = FlightProfile::new(SimConfig {
            corrupt_every: Some(5),
            ..Default::default()
        });
        let mut parser = FrameParser::default();
        let mut errors = 0;
        let mut records = 0;
        for _ in 0..20 {
            for event in parser.feed(&profile.next_frame()) {
                match event {
                    ParseEvent::Record(_) => records += 1,
                    ParseEvent::Error(_) => errors += 1,
                }
            }
        }
        assert_eq!(errors, 4);
        assert_eq!(records, 16);
    }

    #[test]
    fn profile_lifts_off_after_the_pad_hold() {
        let mut profile = FlightProfile::new(SimConfig::default());
        let pad = profile.next_record();
        assert_eq!(pad.mission_time_s, Some(0.0));
        assert!(pad.accel_z.unwrap() > 9.0);

        // 10 Hz: frame 101 is 0.1 s into the burn.
        for _ in 0..100 {
            profile.next_record();
        }
        let boost = profile.next_record();
        assert!(boost.mission_time_s.unwrap() > 0.0);
        assert!(boost.accel_z.unwrap() > 20.0);
    }

    #[test]
    fn only_the_sim_port_opens() {
        let sim = SimTransport::default();
        assert_eq!(sim.enumerate().unwrap()[0].id, SIM_PORT_ID);
        assert!(matches!(sim.open("COM1"), Err(TransportError::NotFound)));
    }
}
