//! # Configuration
//!
//! Station settings shared by the library and the console binary.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Station-wide settings and their validation.
pub mod settings;

// --- Public API Re-exports ---
pub use settings::{ConfigError, StationSettings, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS};
