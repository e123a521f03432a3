//! # Frame Parser
//!
//! A `FrameParser` is fed arbitrary chunks of the device stream and returns
//! every record or error those bytes complete. Partial frames are carried
//! across calls in a bounded buffer.
//!
//! ## Resynchronization
//!
//! An invalid frame only costs its own bytes. After a checksum failure the
//! parser restarts at the next marker found inside the rejected frame window,
//! so a valid frame that followed a truncated one is still recovered.
//!
//! Every rejected frame and every overflow is its own error. Contiguous junk
//! skipped in one scan, including a marker with a bad length byte, is
//! reported once with the total number of bytes dropped.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};

use crate::codec::checksum::{ChecksumKind, FrameCheck};
use crate::codec::error::FrameError;
use crate::codec::frame::{decode_payload, CHECKED_RANGE, FRAME_LEN, FRAME_MARKER, HEADER_LEN, PAYLOAD_LEN};
use crate::core::TelemetryRecord;

/// Default bound on bytes held while no marker is in sight.
pub const DEFAULT_MAX_BUFFER: usize = 1024;

/// One outcome of feeding the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    /// A frame passed validation and was decoded.
    Record(TelemetryRecord),
    /// Bytes were discarded.
    Error(FrameError),
}

/// Settings used to build a parser for each port session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParserConfig {
    /// Integrity check applied to every frame.
    pub checksum: ChecksumKind,
    /// Maximum bytes held without finding a marker.
    pub max_buffer: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            checksum: ChecksumKind::default(),
            max_buffer: DEFAULT_MAX_BUFFER,
        }
    }
}

impl ParserConfig {
    /// Builds a fresh parser with an empty buffer.
    pub fn build(&self) -> FrameParser {
        FrameParser::new(self.checksum.policy(), self.max_buffer)
    }
}

/// # Frame Parser
///
/// Owned by exactly one reader; not shared between threads.
#[derive(Debug)]
pub struct FrameParser {
    buffer: BytesMut,
    check: Arc<dyn FrameCheck>,
    max_buffer: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        ParserConfig::default().build()
    }
}

/// Bytes dropped during one scan, reported as a single `MalformedFrame`.
#[derive(Debug, Default)]
struct Skipped {
    bytes: usize,
    reason: Option<String>,
}

impl Skipped {
    fn add(&mut self, bytes: usize, reason: impl FnOnce() -> String) {
        self.bytes += bytes;
        self.reason.get_or_insert_with(reason);
    }

    fn into_event(self) -> Option<ParseEvent> {
        (self.bytes > 0).then(|| {
            ParseEvent::Error(FrameError::MalformedFrame {
                reason: self.reason.unwrap_or_default(),
                discarded: self.bytes,
            })
        })
    }
}

impl FrameParser {
    /// Creates a parser using `check` for integrity. `max_buffer` is raised
    /// to at least one frame length.
    pub fn new(check: Arc<dyn FrameCheck>, max_buffer: usize) -> Self {
        let max_buffer = max_buffer.max(FRAME_LEN);
        Self {
            buffer: BytesMut::with_capacity(max_buffer),
            check,
            max_buffer,
        }
    }

    /// Appends `chunk` and returns every event it completes, in stream order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ParseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(event) = self.next_event() {
            events.push(event);
        }
        events
    }

    /// Drops any partial frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes currently held.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Name of the integrity policy in use.
    pub fn check_name(&self) -> &'static str {
        self.check.name()
    }

    fn next_event(&mut self) -> Option<ParseEvent> {
        let mut skipped = Skipped::default();
        loop {
            let Some(junk) = find_marker(&self.buffer) else {
                if skipped.bytes == 0 {
                    return self.overflow();
                }
                // The rest of this run of junk belongs to the same error.
                let rest = self.buffer.len() - usize::from(self.buffer.last() == Some(&FRAME_MARKER[0]));
                self.buffer.advance(rest);
                skipped.bytes += rest;
                return skipped.into_event();
            };
            if junk > 0 {
                self.buffer.advance(junk);
                skipped.add(junk, || "unexpected bytes before frame marker".to_string());
                continue;
            }

            if self.buffer.len() < HEADER_LEN {
                return skipped.into_event();
            }

            let declared = usize::from(self.buffer[FRAME_MARKER.len()]);
            if declared != PAYLOAD_LEN {
                self.buffer.advance(FRAME_MARKER.len());
                skipped.add(FRAME_MARKER.len(), || format!("length byte {declared}, expected {PAYLOAD_LEN}"));
                continue;
            }

            // Report dropped bytes before the candidate frame that follows them.
            if skipped.bytes > 0 {
                return skipped.into_event();
            }
            if self.buffer.len() < FRAME_LEN {
                return None;
            }

            let expected = u16::from_le_bytes([self.buffer[FRAME_LEN - 2], self.buffer[FRAME_LEN - 1]]);
            let computed = self.check.compute(&self.buffer[CHECKED_RANGE]);
            if expected != computed {
                // Restart at a marker inside the rejected window, if any.
                let skip = find_marker(&self.buffer[1..FRAME_LEN]).map_or(FRAME_LEN, |pos| pos + 1);
                self.buffer.advance(skip);
                return Some(ParseEvent::Error(FrameError::ChecksumMismatch { expected, computed }));
            }

            let frame = self.buffer.split_to(FRAME_LEN);
            return Some(ParseEvent::Record(decode_payload(
                &frame[HEADER_LEN..HEADER_LEN + PAYLOAD_LEN],
            )));
        }
    }

    /// Enforces the buffer bound when no marker is present.
    fn overflow(&mut self) -> Option<ParseEvent> {
        if self.buffer.len() <= self.max_buffer {
            return None;
        }
        // A trailing first marker byte may be completed by the next chunk.
        let keep = usize::from(self.buffer.last() == Some(&FRAME_MARKER[0]));
        let discarded = self.buffer.len() - keep;
        self.buffer.advance(discarded);
        log::debug!("Frame buffer overflow, {} bytes discarded", discarded);
        Some(ParseEvent::Error(FrameError::FrameTooLarge { discarded }))
    }
}

fn find_marker(bytes: &[u8]) -> Option<usize> {
    bytes.windows(FRAME_MARKER.len()).position(|window| window == FRAME_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::checksum::{Crc16, Xor8};
    use crate::codec::frame::encode_frame;

    fn record(battery: f64) -> TelemetryRecord {
        TelemetryRecord {
            battery_pct: Some(battery),
            satellite_count: Some(7),
            ..Default::default()
        }
    }

    fn frame(battery: f64) -> Vec<u8> {
        encode_frame(&record(battery), &Crc16).to_vec()
    }

    fn records(events: &[ParseEvent]) -> Vec<TelemetryRecord> {
        events
            .iter()
            .filter_map(|event| match event {
                ParseEvent::Record(record) => Some(record.clone()),
                ParseEvent::Error(_) => None,
            })
            .collect()
    }

    fn errors(events: &[ParseEvent]) -> Vec<FrameError> {
        events
            .iter()
            .filter_map(|event| match event {
                ParseEvent::Error(err) => Some(err.clone()),
                ParseEvent::Record(_) => None,
            })
            .collect()
    }

    #[test]
    fn decodes_a_frame_split_across_chunks() {
        let mut parser = FrameParser::default();
        let bytes = frame(87.0);

        for byte in &bytes[..FRAME_LEN - 1] {
            assert!(parser.feed(std::slice::from_ref(byte)).is_empty());
        }
        let events = parser.feed(&bytes[FRAME_LEN - 1..]);
        assert_eq!(events, vec![ParseEvent::Record(record(87.0))]);
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn decodes_back_to_back_frames_in_one_chunk() {
        let mut parser = FrameParser::default();
        let mut bytes = frame(10.0);
        bytes.extend(frame(20.0));
        bytes.extend(frame(30.0));

        let events = parser.feed(&bytes);
        assert_eq!(records(&events), vec![record(10.0), record(20.0), record(30.0)]);
    }

    #[test]
    fn leading_junk_yields_one_malformed_error() {
        let mut parser = FrameParser::default();
        let mut bytes = vec![0x00, 0xFF, 0x13];
        bytes.extend(frame(87.0));

        let events = parser.feed(&bytes);
        assert_eq!(
            errors(&events),
            vec![FrameError::MalformedFrame {
                reason: "unexpected bytes before frame marker".to_string(),
                discarded: 3,
            }]
        );
        assert_eq!(records(&events), vec![record(87.0)]);
    }

    #[test]
    fn corrupted_frame_between_valid_frames_costs_one_error() {
        let mut parser = FrameParser::default();
        let mut corrupted = frame(50.0);
        corrupted[10] ^= 0x40;

        let mut bytes = frame(10.0);
        bytes.extend(&corrupted);
        bytes.extend(frame(20.0));

        let events = parser.feed(&bytes);
        assert_eq!(records(&events), vec![record(10.0), record(20.0)]);
        let errs = errors(&events);
        assert_eq!(errs.len(), 1);
        assert!(matches!(errs[0], FrameError::ChecksumMismatch { .. }));
    }

    #[test]
    fn back_to_back_corrupted_frames_are_each_reported() {
        let mut parser = FrameParser::default();
        let mut first = frame(50.0);
        first[10] ^= 0x40;
        let mut second = frame(60.0);
        second[12] ^= 0x01;

        let mut bytes = frame(10.0);
        bytes.extend(&first);
        bytes.extend(&second);
        bytes.extend(frame(20.0));

        let events = parser.feed(&bytes);
        assert_eq!(records(&events), vec![record(10.0), record(20.0)]);
        let errs = errors(&events);
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().all(|err| matches!(err, FrameError::ChecksumMismatch { .. })));
    }

    #[test]
    fn corrupted_frames_in_separate_chunks_are_each_reported() {
        let mut parser = FrameParser::default();
        let mut reported = 0;
        for battery in 1..=5 {
            let mut bytes = frame(f64::from(battery));
            bytes[8] ^= 0x10;
            reported += errors(&parser.feed(&bytes)).len();
        }
        assert_eq!(reported, 5);
    }

    #[test]
    fn truncated_frame_does_not_swallow_the_next_one() {
        let mut parser = FrameParser::default();
        let mut bytes = frame(10.0)[..12].to_vec();
        bytes.extend(frame(20.0));

        let events = parser.feed(&bytes);
        assert_eq!(records(&events), vec![record(20.0)]);
        assert_eq!(errors(&events).len(), 1);
    }

    #[test]
    fn bad_length_byte_is_malformed() {
        let mut parser = FrameParser::default();
        let mut bytes = frame(10.0);
        bytes[2] = 99;
        bytes.extend(frame(20.0));

        let events = parser.feed(&bytes);
        let errs = errors(&events);
        assert_eq!(errs.len(), 1);
        // The bad marker and the rest of its frame are one run of junk.
        assert!(matches!(errs[0], FrameError::MalformedFrame { discarded: FRAME_LEN, .. }));
        assert_eq!(records(&events), vec![record(20.0)]);
    }

    #[test]
    fn markerless_stream_is_bounded() {
        let mut parser = FrameParser::new(Arc::new(Crc16), 64);
        let mut noise = vec![0x11; 70];
        noise.push(FRAME_MARKER[0]);

        let events = parser.feed(&noise);
        assert_eq!(
            errors(&events),
            vec![FrameError::FrameTooLarge { discarded: 70 }]
        );
        // The trailing half marker is kept and completed by the next chunk.
        assert_eq!(parser.buffered(), 1);
        let rest = &frame(42.0)[1..];
        assert_eq!(records(&parser.feed(rest)), vec![record(42.0)]);
    }

    #[test]
    fn max_buffer_is_at_least_one_frame() {
        let mut parser = FrameParser::new(Arc::new(Crc16), 4);
        assert_eq!(records(&parser.feed(&frame(1.0))), vec![record(1.0)]);
    }

    #[test]
    fn policy_mismatch_rejects_every_frame() {
        let mut parser = ParserConfig {
            checksum: ChecksumKind::Xor8,
            ..Default::default()
        }
        .build();
        assert_eq!(parser.check_name(), Xor8.name());

        let mut bytes = frame(10.0);
        bytes.extend(frame(20.0));
        bytes.extend(frame(30.0));
        let events = parser.feed(&bytes);
        assert!(records(&events).is_empty());
        assert_eq!(errors(&events).len(), 3);
    }

    #[test]
    fn reset_discards_partial_frame() {
        let mut parser = FrameParser::default();
        parser.feed(&frame(10.0)[..15]);
        assert_eq!(parser.buffered(), 15);

        parser.reset();
        assert_eq!(parser.buffered(), 0);
        assert_eq!(records(&parser.feed(&frame(20.0))), vec![record(20.0)]);
    }
}
