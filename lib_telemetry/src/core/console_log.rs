//! # Console Log
//!
//! The operator-facing narration of everything the station does: ports being
//! opened and closed, parse errors, launch steps. It is append-only and
//! bounded, so a console left running for a whole campaign cannot grow
//! without limit. When the cap is reached the oldest entry is evicted.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::dispatcher::{EventBus, StationEvent};

/// Default number of entries retained by the console.
pub const DEFAULT_CONSOLE_CAPACITY: usize = 500;

/// Severity of a console entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsoleLevel {
    /// Normal narration.
    Info,
    /// A recoverable failure the operator should see.
    Error,
}

/// # Console Entry
///
/// Immutable once appended. `seq` increases by one per append and is never
/// reused, which lets readers poll with `entries_since`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleEntry {
    /// Monotonic sequence number, starting at 1.
    pub seq: u64,
    /// Wall-clock time of the append.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: ConsoleLevel,
    /// The narrated text.
    pub text: String,
}

impl fmt::Display for ConsoleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "> {}", self.text)
    }
}

struct ConsoleInner {
    entries: VecDeque<Arc<ConsoleEntry>>,
    next_seq: u64,
}

/// # Console Log
///
/// Shared as `Arc<ConsoleLog>` between the port registry, the ingestion task
/// and the launch sequencer. All appends serialize through one mutex, and the
/// change notification is published while the lock is held so subscribers
/// see events in log order.
pub struct ConsoleLog {
    inner: Mutex<ConsoleInner>,
    capacity: usize,
    bus: EventBus,
}

impl ConsoleLog {
    /// Creates an empty log holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize, bus: EventBus) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(ConsoleInner {
                entries: VecDeque::with_capacity(capacity),
                next_seq: 1,
            }),
            capacity,
            bus,
        }
    }

    /// Appends an informational entry.
    pub fn info(&self, text: impl Into<String>) -> Arc<ConsoleEntry> {
        self.append(ConsoleLevel::Info, text)
    }

    /// Appends an error entry.
    pub fn error(&self, text: impl Into<String>) -> Arc<ConsoleEntry> {
        self.append(ConsoleLevel::Error, text)
    }

    /// Appends an entry, evicting the oldest one when the log is full.
    pub fn append(&self, level: ConsoleLevel, text: impl Into<String>) -> Arc<ConsoleEntry> {
        let mut inner = self.lock();
        let entry = Arc::new(ConsoleEntry {
            seq: inner.next_seq,
            timestamp: Utc::now(),
            level,
            text: text.into(),
        });
        inner.next_seq += 1;

        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(Arc::clone(&entry));

        self.bus.publish(StationEvent::ConsoleAppended(Arc::clone(&entry)));
        entry
    }

    /// A copy of every retained entry, oldest first.
    pub fn entries(&self) -> Vec<Arc<ConsoleEntry>> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Retained entries with a sequence number greater than `seq`.
    pub fn entries_since(&self, seq: u64) -> Vec<Arc<ConsoleEntry>> {
        self.lock()
            .entries
            .iter()
            .filter(|entry| entry.seq > seq)
            .cloned()
            .collect()
    }

    /// The text of every retained entry, oldest first.
    pub fn texts(&self) -> Vec<String> {
        self.lock().entries.iter().map(|entry| entry.text.clone()).collect()
    }

    /// Number of retained error entries.
    pub fn error_count(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|entry| entry.level == ConsoleLevel::Error)
            .count()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// True when nothing has been appended (or everything was evicted, which
    /// cannot happen with a capacity of at least one).
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with(capacity: usize) -> ConsoleLog {
        ConsoleLog::new(capacity, EventBus::new(16))
    }

    #[test]
    fn keeps_the_last_capacity_entries_in_order() {
        let log = log_with(5);
        for i in 0..8 {
            log.info(format!("line {i}"));
        }

        assert_eq!(log.len(), 5);
        assert_eq!(
            log.texts(),
            vec!["line 3", "line 4", "line 5", "line 6", "line 7"]
        );
        let seqs: Vec<u64> = log.entries().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![4, 5, 6, 7, 8]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let log = log_with(3);
        for i in 0..100 {
            log.info(i.to_string());
            assert!(log.len() <= log.capacity());
        }
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let log = log_with(0);
        log.info("a");
        log.info("b");
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.texts(), vec!["b"]);
    }

    #[test]
    fn entries_since_returns_only_newer_entries() {
        let log = log_with(10);
        let first = log.info("first");
        log.error("second");
        log.info("third");

        let newer: Vec<String> = log
            .entries_since(first.seq)
            .iter()
            .map(|e| e.text.clone())
            .collect();
        assert_eq!(newer, vec!["second", "third"]);
        assert_eq!(log.error_count(), 1);
    }

    #[test]
    fn append_publishes_the_entry() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe();
        let log = ConsoleLog::new(4, bus);

        let entry = log.info("opened COM3");
        match sub.try_recv() {
            Some(StationEvent::ConsoleAppended(seen)) => assert_eq!(seen, entry),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn display_uses_console_prompt() {
        let log = log_with(1);
        let entry = log.info("Initializing system...");
        assert_eq!(entry.to_string(), "> Initializing system...");
    }
}
