//! # Mock Transport
//!
//! An in-memory transport for exercising the registry without hardware. Each
//! successful `open` creates a channel; a `MockDevice` handle pushes bytes or
//! read failures into it, and `unplug` drops the sending half so the reader
//! sees end of stream.

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::ports::transport::{ByteStream, PortInfo, SerialTransport, TransportError};

/// How long a mock read waits before reporting `TimedOut`.
pub const MOCK_READ_TIMEOUT: Duration = Duration::from_millis(20);

/// One item delivered to a mock stream.
#[derive(Debug, Clone)]
pub enum MockChunk {
    /// Bytes returned by the next reads.
    Data(Vec<u8>),
    /// A read failure of the given kind.
    Fail(io::ErrorKind, String),
}

#[derive(Debug)]
struct MockPort {
    info: PortInfo,
    refusal: Option<String>,
    sender: Option<Sender<MockChunk>>,
    opens: usize,
}

type PortTable = Arc<Mutex<BTreeMap<String, MockPort>>>;

fn lock(table: &PortTable) -> MutexGuard<'_, BTreeMap<String, MockPort>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Mock Transport
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    ports: PortTable,
}

impl MockTransport {
    /// Creates a transport with no ports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport offering `ids`.
    pub fn with_ports<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let transport = Self::new();
        for id in ids {
            transport.add_port(id);
        }
        transport
    }

    /// Makes `id` appear in enumeration.
    pub fn add_port(&self, id: impl Into<String>) {
        let id = id.into();
        let info = PortInfo::new(id.clone(), format!("Mock device {id}"));
        lock(&self.ports).insert(
            id,
            MockPort {
                info,
                refusal: None,
                sender: None,
                opens: 0,
            },
        );
    }

    /// Removes `id` from enumeration. An open stream on it sees end of stream.
    pub fn remove_port(&self, id: &str) {
        lock(&self.ports).remove(id);
    }

    /// Makes every future `open` of `id` fail with `reason`.
    pub fn refuse_open(&self, id: &str, reason: impl Into<String>) {
        if let Some(port) = lock(&self.ports).get_mut(id) {
            port.refusal = Some(reason.into());
        }
    }

    /// Lets `id` be opened again after `refuse_open`.
    pub fn allow_open(&self, id: &str) {
        if let Some(port) = lock(&self.ports).get_mut(id) {
            port.refusal = None;
        }
    }

    /// Number of successful opens of `id`.
    pub fn open_count(&self, id: &str) -> usize {
        lock(&self.ports).get(id).map_or(0, |port| port.opens)
    }

    /// A handle driving the device side of `id`.
    pub fn device(&self, id: &str) -> MockDevice {
        MockDevice {
            port_id: id.to_string(),
            ports: Arc::clone(&self.ports),
        }
    }
}

impl SerialTransport for MockTransport {
    fn enumerate(&self) -> Result<Vec<PortInfo>, TransportError> {
        Ok(lock(&self.ports).values().map(|port| port.info.clone()).collect())
    }

    fn open(&self, port_id: &str) -> Result<ByteStream, TransportError> {
        let mut ports = lock(&self.ports);
        let port = ports.get_mut(port_id).ok_or(TransportError::NotFound)?;
        if let Some(reason) = &port.refusal {
            return Err(TransportError::Refused(reason.clone()));
        }

        let (sender, receiver) = mpsc::channel();
        port.sender = Some(sender);
        port.opens += 1;
        Ok(Box::new(MockStream {
            receiver,
            pending: VecDeque::new(),
        }))
    }
}

/// # Mock Device
///
/// The device end of a mock port. Methods act on the most recent session and
/// return `false` when no stream is listening.
#[derive(Debug, Clone)]
pub struct MockDevice {
    port_id: String,
    ports: PortTable,
}

impl MockDevice {
    /// Delivers `bytes` to the open stream.
    pub fn send(&self, bytes: &[u8]) -> bool {
        self.push(MockChunk::Data(bytes.to_vec()))
    }

    /// Makes the next read fail with `kind`.
    pub fn fail(&self, kind: io::ErrorKind, message: impl Into<String>) -> bool {
        self.push(MockChunk::Fail(kind, message.into()))
    }

    /// Ends the open stream as if the cable were pulled.
    pub fn unplug(&self) -> bool {
        lock(&self.ports)
            .get_mut(&self.port_id)
            .and_then(|port| port.sender.take())
            .is_some()
    }

    fn push(&self, chunk: MockChunk) -> bool {
        lock(&self.ports)
            .get(&self.port_id)
            .and_then(|port| port.sender.as_ref())
            .is_some_and(|sender| sender.send(chunk).is_ok())
    }
}

struct MockStream {
    receiver: Receiver<MockChunk>,
    pending: VecDeque<u8>,
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.receiver.recv_timeout(MOCK_READ_TIMEOUT) {
                Ok(MockChunk::Data(bytes)) => self.pending.extend(bytes),
                Ok(MockChunk::Fail(kind, message)) => return Err(io::Error::new(kind, message)),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_bytes_reach_the_stream() {
        let transport = MockTransport::with_ports(["COM3"]);
        let mut stream = transport.open("COM3").unwrap();
        let device = transport.device("COM3");

        assert!(device.send(&[1, 2, 3, 4]));
        let mut buf = [0u8; 3];
        assert_eq!(stream.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(stream.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 4);
    }

    #[test]
    fn idle_stream_times_out_and_unplug_ends_it() {
        let transport = MockTransport::with_ports(["COM3"]);
        let mut stream = transport.open("COM3").unwrap();
        let mut buf = [0u8; 8];

        let err = stream.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        assert!(transport.device("COM3").unplug());
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn refused_ports_do_not_open() {
        let transport = MockTransport::with_ports(["COM3"]);
        transport.refuse_open("COM3", "access denied");
        assert!(matches!(transport.open("COM3"), Err(TransportError::Refused(_))));
        assert_eq!(transport.open_count("COM3"), 0);

        transport.allow_open("COM3");
        assert!(transport.open("COM3").is_ok());
        assert!(matches!(transport.open("COM4"), Err(TransportError::NotFound)));
    }

    #[test]
    fn send_without_session_is_rejected() {
        let transport = MockTransport::with_ports(["COM3"]);
        assert!(!transport.device("COM3").send(&[0xA5]));
    }
}
