//! # lib_telemetry
//!
//! Telemetry ingestion and launch-sequencing core of the ground station
//! console. The crate owns the serial-port lifecycle, turns the device byte
//! stream into typed telemetry records, and narrates launch sequences into a
//! bounded console log. Presentation layers subscribe to the event bus and
//! re-read the immutable snapshots this crate produces.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Shared data holders: console log, telemetry store and event bus.
pub mod core;
/// Frame layout, integrity checks and the resynchronizing frame parser.
pub mod codec;
/// Serial transports and the exclusive port registry.
pub mod ports;
/// Launch scripts, trigger strategies and the launch sequencer.
pub mod launch;
/// Station settings and their validation.
pub mod configs;
/// The facade wiring every component together for a UI layer.
pub mod station;

// --- Public API Re-exports ---
pub use crate::core::{
    ConsoleEntry, ConsoleLevel, ConsoleLog, EventBus, StationEvent, Subscription, TelemetryRecord, TelemetryStats,
    TelemetryStore,
};
pub use codec::{ChecksumKind, FrameError, FrameParser, ParseEvent, ParserConfig};
pub use configs::{ConfigError, StationSettings};
pub use launch::{
    LaunchController, LaunchError, LaunchMode, LaunchScript, LaunchSequencer, LaunchState, LaunchStep, TelemetryCondition,
};
pub use ports::{Port, PortError, PortRegistry, PortState, SerialTransport};
pub use station::{Capabilities, GroundStation, StationStatus};
