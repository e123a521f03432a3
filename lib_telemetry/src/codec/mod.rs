//! # Frame Codec
//!
//! Turns the raw device byte stream into `TelemetryRecord`s.
//!
//! ## Core Components:
//!
//! - **`frame`**: The wire layout (marker, length, payload, checksum), the
//!   named scaling constants and the payload encoder/decoder.
//! - **`checksum`**: The pluggable `FrameCheck` integrity policies.
//! - **`parser`**: The stateful `FrameParser` that buffers partial frames and
//!   resynchronizes after corruption.
//! - **`error`**: The recoverable `FrameError` taxonomy.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Integrity check policies.
pub mod checksum;
/// Parser error taxonomy.
pub mod error;
/// Wire layout and payload encoding.
pub mod frame;
/// Resynchronizing stream parser.
pub mod parser;

// --- Public API Re-exports ---
pub use checksum::{ChecksumKind, Crc16, FrameCheck, Xor8};
pub use error::FrameError;
pub use frame::{decode_payload, encode_frame, FRAME_LEN, FRAME_MARKER, PAYLOAD_LEN};
pub use parser::{FrameParser, ParseEvent, ParserConfig, DEFAULT_MAX_BUFFER};
