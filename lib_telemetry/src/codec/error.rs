use thiserror::Error;

/// # Frame Error
///
/// Every variant is recoverable: the parser has already dropped the offending
/// bytes and will keep scanning when it is fed again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Bytes that cannot start or form a frame were skipped.
    #[error("malformed frame: {reason} ({discarded} bytes discarded)")]
    MalformedFrame {
        /// What was wrong with the bytes.
        reason: String,
        /// How many bytes were dropped.
        discarded: usize,
    },

    /// A complete frame failed its integrity check.
    #[error("checksum mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch {
        /// Checksum carried by the frame.
        expected: u16,
        /// Checksum computed over the received bytes.
        computed: u16,
    },

    /// Too many bytes arrived without any frame marker.
    #[error("frame too large: {discarded} bytes without a frame marker")]
    FrameTooLarge {
        /// How many bytes were dropped.
        discarded: usize,
    },
}
