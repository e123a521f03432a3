//! # Telemetry Store
//!
//! Holds the last-known-good `TelemetryRecord`. Successful decodes replace the
//! snapshot wholesale; parse failures only bump a counter, so the previous
//! record survives any amount of line noise.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::core::dispatcher::{EventBus, StationEvent};
use crate::core::record::TelemetryRecord;

/// Counters kept alongside the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryStats {
    /// Records decoded since the store was created.
    pub records_decoded: u64,
    /// Frames rejected by the parser since the store was created.
    pub parse_errors: u64,
}

/// # Telemetry Store
///
/// Backed by a `watch` channel: the sender is the single mutation point and
/// every reader borrows a complete `Arc<TelemetryRecord>`.
pub struct TelemetryStore {
    snapshot: watch::Sender<Arc<TelemetryRecord>>,
    records_decoded: AtomicU64,
    parse_errors: AtomicU64,
    bus: EventBus,
}

impl TelemetryStore {
    /// Creates a store holding the all-unset default record.
    pub fn new(bus: EventBus) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(TelemetryRecord::default()));
        Self {
            snapshot,
            records_decoded: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            bus,
        }
    }

    /// Replaces the snapshot with a freshly decoded record.
    pub fn replace(&self, record: TelemetryRecord) -> Arc<TelemetryRecord> {
        let record = Arc::new(record);
        self.snapshot.send_replace(Arc::clone(&record));
        self.records_decoded.fetch_add(1, Ordering::Relaxed);
        self.bus.publish(StationEvent::TelemetryUpdated(Arc::clone(&record)));
        record
    }

    /// Counts a rejected frame. The snapshot is left untouched.
    pub fn record_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// The most recent record, or the default record if nothing was decoded.
    pub fn latest(&self) -> Arc<TelemetryRecord> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// A receiver that wakes whenever the snapshot is replaced.
    pub fn subscribe(&self) -> watch::Receiver<Arc<TelemetryRecord>> {
        self.snapshot.subscribe()
    }

    /// Decode and error counters.
    pub fn stats(&self) -> TelemetryStats {
        TelemetryStats {
            records_decoded: self.records_decoded.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_defaults_to_empty_record() {
        let store = TelemetryStore::new(EventBus::default());
        assert!(store.latest().is_empty());
        assert_eq!(store.stats(), TelemetryStats::default());
    }

    #[test]
    fn errors_do_not_touch_the_snapshot() {
        let store = TelemetryStore::new(EventBus::default());
        store.replace(TelemetryRecord {
            battery_pct: Some(87.0),
            ..Default::default()
        });
        store.record_error();
        store.record_error();

        assert_eq!(store.latest().battery_pct, Some(87.0));
        assert_eq!(
            store.stats(),
            TelemetryStats {
                records_decoded: 1,
                parse_errors: 2
            }
        );
    }

    #[tokio::test]
    async fn subscribers_are_woken_by_replace() {
        let store = TelemetryStore::new(EventBus::default());
        let mut rx = store.subscribe();

        store.replace(TelemetryRecord {
            satellite_count: Some(9),
            ..Default::default()
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().satellite_count, Some(9));
    }
}
