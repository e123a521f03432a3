//! # Port Reader
//!
//! The blocking loop that owns an open stream and its `FrameParser`. It runs
//! on a `spawn_blocking` thread for the lifetime of one port session.

use std::io::{self, Read};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::codec::{FrameParser, ParseEvent};
use crate::core::{ConsoleLog, EventBus, StationEvent, TelemetryStore};
use crate::ports::error::PortError;
use crate::ports::registry::{PortState, RegistryShared};
use crate::ports::transport::ByteStream;

const READ_CHUNK: usize = 256;

/// Everything the reader thread owns or shares.
pub(crate) struct PortReader {
    pub(crate) session_id: u64,
    pub(crate) port_id: String,
    pub(crate) stream: ByteStream,
    pub(crate) parser: FrameParser,
    pub(crate) cancel: CancellationToken,
    pub(crate) shared: Arc<Mutex<RegistryShared>>,
    pub(crate) console: Arc<ConsoleLog>,
    pub(crate) store: Arc<TelemetryStore>,
    pub(crate) bus: EventBus,
}

impl PortReader {
    /// Reads until cancelled or the stream ends.
    pub(crate) fn run(mut self) {
        let mut buf = [0u8; READ_CHUNK];
        let mut acquired = false;

        let disconnect = loop {
            if self.cancel.is_cancelled() {
                break None;
            }
            match self.stream.read(&mut buf) {
                Ok(0) => break Some("end of stream".to_string()),
                Ok(n) => self.ingest(&buf[..n], &mut acquired),
                Err(e) if is_idle(&e) => continue,
                Err(e) => break Some(e.to_string()),
            }
        };

        log::debug!(
            "Reader for {} exiting, {} partial bytes dropped",
            self.port_id,
            self.parser.buffered()
        );
        self.parser.reset();

        if let Some(reason) = disconnect {
            self.disconnected(reason);
        }
    }

    fn ingest(&mut self, bytes: &[u8], acquired: &mut bool) {
        for event in self.parser.feed(bytes) {
            match event {
                ParseEvent::Record(record) => {
                    self.store.replace(record);
                    if !*acquired {
                        *acquired = true;
                        self.console
                            .info(format!("telemetry stream acquired on {}", self.port_id));
                    }
                }
                ParseEvent::Error(err) => {
                    self.store.record_error();
                    log::warn!("{}: {}", self.port_id, err);
                    self.console.error(err.to_string());
                }
            }
        }
    }

    /// Implicit close after a read failure: one error entry, then the same
    /// `closed` line an explicit close writes. Skipped when `close()` already
    /// took the session.
    fn disconnected(&self, reason: String) {
        let mut shared = lock(&self.shared);
        let ours = shared
            .session
            .as_ref()
            .is_some_and(|session| session.id == self.session_id);
        if !ours || self.cancel.is_cancelled() {
            return;
        }
        shared.session = None;

        let err = PortError::PortDisconnected {
            port_id: self.port_id.clone(),
            reason,
        };
        log::warn!("{}", err);
        self.console.error(err.to_string());
        self.console.info(format!("closed {}", self.port_id));
        self.bus.publish(StationEvent::PortChanged {
            port_id: self.port_id.clone(),
            state: PortState::Closed,
        });
    }
}

fn is_idle(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

pub(crate) fn lock(shared: &Mutex<RegistryShared>) -> MutexGuard<'_, RegistryShared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
