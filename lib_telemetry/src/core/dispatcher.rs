//! # Station Event Bus
//!
//! The `EventBus` is how the core tells presentation layers that something
//! changed. Components publish small `StationEvent`s; subscribers re-read the
//! immutable snapshots they care about.
//!
//! ## Core Design Principles:
//!
//! 1.  **Zero-Copy Fan-out**: Console entries and telemetry records travel as
//!     `Arc`s, so every subscriber gets a pointer to the same allocation.
//!
//! 2.  **Publishers Never Block**: The bus is a bounded `tokio::sync::broadcast`
//!     channel. Publishing succeeds immediately even when nobody listens, and a
//!     slow subscriber only loses its own oldest events (it is told how many
//!     through the `Lagged` path and keeps going).
//!
//! 3.  **Scoped Subscriptions**: A `Subscription` is a plain value. Dropping it
//!     unregisters the subscriber; there is no global listener table to clean up.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::core::console_log::ConsoleEntry;
use crate::core::record::TelemetryRecord;
use crate::launch::LaunchState;
use crate::ports::PortState;

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// # Station Event
///
/// A change notification emitted by the core.
#[derive(Debug, Clone)]
pub enum StationEvent {
    /// A console entry was appended.
    ConsoleAppended(Arc<ConsoleEntry>),
    /// The telemetry snapshot was replaced by a freshly decoded record.
    TelemetryUpdated(Arc<TelemetryRecord>),
    /// A port changed state (opened, closed, disconnected, faulted).
    PortChanged {
        /// Identifier of the port.
        port_id: String,
        /// The port's new state.
        state: PortState,
    },
    /// The launch sequencer moved to a new state.
    LaunchChanged(LaunchState),
    /// The externally observed run flag flipped.
    RunFlagChanged(bool),
}

/// # Event Bus
///
/// Cheap to clone; every clone publishes into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StationEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to every current subscriber.
    pub fn publish(&self, event: StationEvent) {
        // An error only means there is no subscriber right now.
        let _ = self.sender.send(event);
    }

    /// Registers a new subscriber. It sees events published from now on.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// # Subscription
///
/// The receiving half handed to a UI layer.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<StationEvent>,
}

impl Subscription {
    /// Waits for the next event. Returns `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<StationEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Subscriber lagged behind, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<StationEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!("Subscriber lagged behind, {} events skipped", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
