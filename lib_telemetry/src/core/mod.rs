//! # Core Data Holders
//!
//! The only shared mutable state of the telemetry core lives here. Every
//! writer goes through a single mutation point per holder, so readers always
//! observe fully constructed records and entries.
//!
//! ## Core Components:
//!
//! - **`record`**: The immutable `TelemetryRecord` snapshot decoded from frames.
//! - **`console_log`**: The bounded, append-only operator console.
//! - **`telemetry_store`**: The last-known-good telemetry snapshot plus counters.
//! - **`dispatcher`**: The event bus that fans change notifications out to any
//!   number of read-only subscribers.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// The decoded telemetry snapshot type.
pub mod record;
/// Bounded, FIFO-evicting console log.
pub mod console_log;
/// Last-known-good telemetry snapshot.
pub mod telemetry_store;
/// Change-notification fan-out for UI subscribers.
pub mod dispatcher;

// --- Public API Re-exports ---
pub use record::TelemetryRecord;
pub use console_log::{ConsoleEntry, ConsoleLevel, ConsoleLog, DEFAULT_CONSOLE_CAPACITY};
pub use telemetry_store::{TelemetryStats, TelemetryStore};
pub use dispatcher::{EventBus, StationEvent, Subscription, DEFAULT_EVENT_CAPACITY};
