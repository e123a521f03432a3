//! # Serial Transport Seam
//!
//! Everything the registry needs from a byte source: enumerate the ports it
//! offers and open one of them as a blocking `Read`. Dropping the stream
//! closes the underlying handle.

use std::io::Read;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

/// A blocking byte stream from an open port.
///
/// Reads should return `io::ErrorKind::TimedOut` when no data arrives within
/// the transport's read timeout, `Ok(0)` at end of stream.
pub type ByteStream = Box<dyn Read + Send>;

/// A port as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    /// Identifier passed to `open` (e.g. `COM3`, `/dev/ttyUSB0`, `SIM0`).
    pub id: String,
    /// Human-readable description.
    pub display_name: String,
}

impl PortInfo {
    /// Creates a port description.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Failures raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The port list could not be read.
    #[error("port enumeration failed: {0}")]
    Enumeration(String),

    /// The transport does not offer this port.
    #[error("no such port")]
    NotFound,

    /// The port exists but the operating system refused to open it.
    #[error("{0}")]
    Refused(String),
}

/// # Serial Transport
///
/// Implementations must be cheap to call from any thread; `open` may block
/// and is always invoked from a blocking-capable thread.
pub trait SerialTransport: Send + Sync {
    /// Lists the ports currently available.
    fn enumerate(&self) -> Result<Vec<PortInfo>, TransportError>;

    /// Opens `port_id` for reading.
    fn open(&self, port_id: &str) -> Result<ByteStream, TransportError>;
}

/// # Composite Transport
///
/// Presents several transports as one. Enumeration concatenates every
/// member's ports; `open` is routed to the first member that lists the id.
#[derive(Default, Clone)]
pub struct CompositeTransport {
    members: Vec<Arc<dyn SerialTransport>>,
}

impl CompositeTransport {
    /// Creates an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member transport.
    pub fn with(mut self, transport: Arc<dyn SerialTransport>) -> Self {
        self.members.push(transport);
        self
    }

    /// Number of member transports.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when no member has been added.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl SerialTransport for CompositeTransport {
    fn enumerate(&self) -> Result<Vec<PortInfo>, TransportError> {
        let mut ports = Vec::new();
        let mut last_error = None;
        for member in &self.members {
            match member.enumerate() {
                Ok(found) => ports.extend(found),
                Err(err) => {
                    log::warn!("Transport enumeration failed: {}", err);
                    last_error = Some(err);
                }
            }
        }
        // Only fail when nothing could be enumerated at all.
        match last_error {
            Some(err) if ports.is_empty() => Err(err),
            _ => Ok(ports),
        }
    }

    fn open(&self, port_id: &str) -> Result<ByteStream, TransportError> {
        for member in &self.members {
            let listed = member
                .enumerate()
                .map(|ports| ports.iter().any(|port| port.id == port_id))
                .unwrap_or(false);
            if listed {
                return member.open(port_id);
            }
        }
        Err(TransportError::NotFound)
    }
}
