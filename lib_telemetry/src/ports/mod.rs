//! # Serial Ports
//!
//! Port discovery, the exclusive port session and the transports behind it.
//!
//! ## Core Components:
//!
//! - **`transport`**: The `SerialTransport` seam and the `CompositeTransport`
//!   that merges several of them.
//! - **`registry`**: The `PortRegistry` enforcing one open port at a time.
//! - **`reader`**: The blocking loop that feeds the parser from the open port.
//! - **`serial`**: Operating-system ports (feature `serial`).
//! - **`sim`**: The frame-emitting telemetry simulator.
//! - **`mock`**: An in-memory transport driven by tests.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Port lifecycle errors.
pub mod error;
/// In-memory transport for tests and demos.
pub mod mock;
mod reader;
/// The exclusive port registry.
pub mod registry;
/// Operating-system serial ports.
#[cfg(feature = "serial")]
pub mod serial;
/// Telemetry simulator transport.
pub mod sim;
/// The transport seam.
pub mod transport;

// --- Public API Re-exports ---
pub use error::PortError;
pub use mock::{MockDevice, MockTransport};
pub use registry::{Port, PortRegistry, PortState};
#[cfg(feature = "serial")]
pub use serial::OsSerialTransport;
pub use sim::{SimConfig, SimTransport, SIM_PORT_ID};
pub use transport::{ByteStream, CompositeTransport, PortInfo, SerialTransport, TransportError};
