//! # Port Registry
//!
//! Owns the single open port of the process.
//!
//! ## Core Design Principles:
//!
//! 1.  **Exclusive Access**: At most one session exists. `open` refuses with
//!     `PortBusy` while it does, even for the same port id.
//!
//! 2.  **Serialized Lifecycle**: `open` and `close` hold an async mutex for
//!     their whole duration, so a `close` issued mid-`open` waits for the open
//!     to settle instead of racing it.
//!
//! 3.  **Owned Reader**: Each session has one blocking reader thread with its
//!     own parser. The session's `CancellationToken` stops it, and dropping
//!     the registry cancels whatever is still running.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::ParserConfig;
use crate::core::{ConsoleLog, EventBus, StationEvent, TelemetryStore};
use crate::ports::error::PortError;
use crate::ports::reader::{lock, PortReader};
use crate::ports::transport::{SerialTransport, TransportError};

/// Lifecycle state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PortState {
    /// Not in use.
    Closed,
    /// Held by the current session.
    Open,
    /// The last attempt to open it failed at OS level.
    Error,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PortState::Closed => "closed",
            PortState::Open => "open",
            PortState::Error => "error",
        };
        f.write_str(label)
    }
}

/// A port as presented to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    /// Identifier accepted by `open`.
    pub id: String,
    /// Human-readable description.
    pub display_name: String,
    /// Current state.
    pub state: PortState,
}

pub(crate) struct ActiveSession {
    pub(crate) id: u64,
    pub(crate) port_id: String,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

#[derive(Default)]
pub(crate) struct RegistryShared {
    pub(crate) session: Option<ActiveSession>,
    faulted: HashSet<String>,
    next_session: u64,
}

/// # Port Registry
pub struct PortRegistry {
    transport: Arc<dyn SerialTransport>,
    console: Arc<ConsoleLog>,
    store: Arc<TelemetryStore>,
    bus: EventBus,
    parser: ParserConfig,
    op_lock: tokio::sync::Mutex<()>,
    shared: Arc<Mutex<RegistryShared>>,
}

impl PortRegistry {
    /// Creates a registry reading through `transport`. Decoded records go to
    /// `store`, lifecycle narration to `console`.
    pub fn new(
        transport: Arc<dyn SerialTransport>,
        console: Arc<ConsoleLog>,
        store: Arc<TelemetryStore>,
        bus: EventBus,
        parser: ParserConfig,
    ) -> Self {
        Self {
            transport,
            console,
            store,
            bus,
            parser,
            op_lock: tokio::sync::Mutex::new(()),
            shared: Arc::new(Mutex::new(RegistryShared::default())),
        }
    }

    /// Every enumerated port with its current state. The open port is listed
    /// even if enumeration no longer reports it.
    pub fn list(&self) -> Vec<Port> {
        let found = self.transport.enumerate().unwrap_or_else(|e| {
            log::warn!("Port enumeration failed: {}", e);
            Vec::new()
        });

        let shared = lock(&self.shared);
        let open = shared.session.as_ref().map(|session| session.port_id.as_str());
        let state_of = |id: &str| {
            if open == Some(id) {
                PortState::Open
            } else if shared.faulted.contains(id) {
                PortState::Error
            } else {
                PortState::Closed
            }
        };

        let mut ports: Vec<Port> = found
            .into_iter()
            .map(|info| Port {
                state: state_of(&info.id),
                id: info.id,
                display_name: info.display_name,
            })
            .collect();

        if let Some(open) = open {
            if !ports.iter().any(|port| port.id == open) {
                ports.push(Port {
                    id: open.to_string(),
                    display_name: open.to_string(),
                    state: PortState::Open,
                });
            }
        }
        ports
    }

    /// Id of the open port, if any.
    pub fn open_port_id(&self) -> Option<String> {
        lock(&self.shared)
            .session
            .as_ref()
            .map(|session| session.port_id.clone())
    }

    /// True while a port session is active.
    pub fn is_connected(&self) -> bool {
        lock(&self.shared).session.is_some()
    }

    /// Opens `port_id` and starts streaming it into the telemetry store.
    ///
    /// Failures are also appended to the console as one error entry.
    pub async fn open(&self, port_id: &str) -> Result<(), PortError> {
        let _guard = self.op_lock.lock().await;
        let result = self.open_locked(port_id).await;
        if let Err(err) = &result {
            log::warn!("{}", err);
            self.console.error(err.to_string());
        }
        result
    }

    async fn open_locked(&self, port_id: &str) -> Result<(), PortError> {
        if let Some(open) = self.open_port_id() {
            return Err(PortError::PortBusy {
                requested: port_id.to_string(),
                open,
            });
        }

        let unavailable = |reason: String| PortError::PortUnavailable {
            port_id: port_id.to_string(),
            reason,
        };

        let listed = self
            .transport
            .enumerate()
            .map_err(|e| unavailable(e.to_string()))?
            .iter()
            .any(|info| info.id == port_id);
        if !listed {
            return Err(unavailable("no such port".to_string()));
        }

        let transport = Arc::clone(&self.transport);
        let target = port_id.to_string();
        let opened = tokio::task::spawn_blocking(move || transport.open(&target))
            .await
            .map_err(|e| unavailable(format!("open task failed: {e}")))?;

        let stream = match opened {
            Ok(stream) => stream,
            Err(TransportError::NotFound) => return Err(unavailable("no such port".to_string())),
            Err(err) => {
                lock(&self.shared).faulted.insert(port_id.to_string());
                self.bus.publish(StationEvent::PortChanged {
                    port_id: port_id.to_string(),
                    state: PortState::Error,
                });
                return Err(unavailable(err.to_string()));
            }
        };

        let cancel = CancellationToken::new();
        let session_id = {
            let mut shared = lock(&self.shared);
            shared.faulted.remove(port_id);
            shared.next_session += 1;
            let id = shared.next_session;
            shared.session = Some(ActiveSession {
                id,
                port_id: port_id.to_string(),
                cancel: cancel.clone(),
                reader: None,
            });
            id
        };

        log::info!("Opened port {}", port_id);
        self.console.info(format!("opened {port_id}"));
        self.bus.publish(StationEvent::PortChanged {
            port_id: port_id.to_string(),
            state: PortState::Open,
        });

        let reader = PortReader {
            session_id,
            port_id: port_id.to_string(),
            stream,
            parser: self.parser.build(),
            cancel,
            shared: Arc::clone(&self.shared),
            console: Arc::clone(&self.console),
            store: Arc::clone(&self.store),
            bus: self.bus.clone(),
        };
        let handle = tokio::task::spawn_blocking(move || reader.run());

        // The reader may already have ended the session on an early disconnect.
        if let Some(session) = lock(&self.shared)
            .session
            .as_mut()
            .filter(|session| session.id == session_id)
        {
            session.reader = Some(handle);
        }
        Ok(())
    }

    /// Closes the open port. Succeeds without effect when nothing is open.
    pub async fn close(&self) -> Result<(), PortError> {
        let _guard = self.op_lock.lock().await;

        let Some(mut session) = lock(&self.shared).session.take() else {
            return Ok(());
        };
        session.cancel.cancel();
        if let Some(reader) = session.reader.take() {
            if let Err(e) = reader.await {
                log::error!("Reader for {} ended abnormally: {}", session.port_id, e);
            }
        }

        log::info!("Closed port {}", session.port_id);
        self.console.info(format!("closed {}", session.port_id));
        self.bus.publish(StationEvent::PortChanged {
            port_id: session.port_id,
            state: PortState::Closed,
        });
        Ok(())
    }
}

impl Drop for PortRegistry {
    fn drop(&mut self) {
        if let Some(session) = lock(&self.shared).session.as_ref() {
            session.cancel.cancel();
        }
    }
}
