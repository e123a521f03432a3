//! # Station Settings
//!
//! Every tunable of the core in one serde struct. Missing keys take their
//! defaults, so a settings file only needs the values it changes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{ChecksumKind, ParserConfig, DEFAULT_MAX_BUFFER, FRAME_LEN};
use crate::core::{DEFAULT_CONSOLE_CAPACITY, DEFAULT_EVENT_CAPACITY};
use crate::launch::{LaunchError, LaunchMode, LaunchScript, TelemetryCondition};
use crate::ports::SimConfig;

/// Default serial line speed.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
/// Default blocking read timeout in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

const MAX_READ_TIMEOUT_MS: u64 = 10_000;
const MAX_SIMULATOR_RATE_HZ: f64 = 1000.0;

#[derive(Debug, Error)]
/// # Configuration Error
pub enum ConfigError {
    /// A settings or script file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A settings file is not valid JSON for `StationSettings`.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is out of range.
    #[error("invalid setting {field}: {reason}")]
    Invalid {
        /// Setting name as it appears in the file.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The launch script or its live conditions are unusable.
    #[error(transparent)]
    Script(#[from] LaunchError),
}

/// # Station Settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StationSettings {
    /// Console entries kept before the oldest is evicted.
    pub console_capacity: usize,
    /// Events buffered per bus subscriber.
    pub event_capacity: usize,
    /// Bytes the parser holds without seeing a frame marker.
    pub max_frame_buffer: usize,
    /// Frame integrity policy.
    pub checksum: ChecksumKind,
    /// Serial line speed.
    pub baud_rate: u32,
    /// Blocking read timeout, bounding how fast a close is noticed.
    pub read_timeout_ms: u64,
    /// Offer the `SIM0` simulator port.
    pub simulator: bool,
    /// Simulator frame rate.
    pub simulator_rate_hz: f64,
    /// Simulator corrupts every n-th frame when set.
    pub simulator_corrupt_every: Option<u32>,
    /// Mock (timed) or live (telemetry-driven) launches.
    pub launch_mode: LaunchMode,
    /// JSON script replacing the built-in countdown.
    pub launch_script: Option<PathBuf>,
    /// Live-mode conditions, empty or one per script step.
    pub live_conditions: Vec<Option<TelemetryCondition>>,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            console_capacity: DEFAULT_CONSOLE_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            max_frame_buffer: DEFAULT_MAX_BUFFER,
            checksum: ChecksumKind::default(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            simulator: true,
            simulator_rate_hz: SimConfig::default().rate_hz,
            simulator_corrupt_every: None,
            launch_mode: LaunchMode::default(),
            launch_script: None,
            live_conditions: Vec::new(),
        }
    }
}

impl StationSettings {
    /// Reads and validates a JSON settings file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks every value is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: String| Err(ConfigError::Invalid { field, reason });

        if self.console_capacity == 0 {
            return invalid("consoleCapacity", "must be at least 1".into());
        }
        if self.event_capacity == 0 {
            return invalid("eventCapacity", "must be at least 1".into());
        }
        if self.max_frame_buffer < FRAME_LEN {
            return invalid(
                "maxFrameBuffer",
                format!("{} is smaller than one frame ({FRAME_LEN} bytes)", self.max_frame_buffer),
            );
        }
        if self.baud_rate == 0 {
            return invalid("baudRate", "must be positive".into());
        }
        if !(1..=MAX_READ_TIMEOUT_MS).contains(&self.read_timeout_ms) {
            return invalid(
                "readTimeoutMs",
                format!("{} is outside 1..={MAX_READ_TIMEOUT_MS}", self.read_timeout_ms),
            );
        }
        let rate = self.simulator_rate_hz;
        if !(rate.is_finite() && rate > 0.0 && rate <= MAX_SIMULATOR_RATE_HZ) {
            return invalid(
                "simulatorRateHz",
                format!("{rate} is outside (0, {MAX_SIMULATOR_RATE_HZ}]"),
            );
        }
        if self.simulator_corrupt_every == Some(0) {
            return invalid("simulatorCorruptEvery", "must be at least 1 when set".into());
        }
        Ok(())
    }

    /// Loads the configured script, or the built-in countdown, and checks the
    /// live conditions line up with it.
    pub fn load_launch_script(&self) -> Result<LaunchScript, ConfigError> {
        let script = match &self.launch_script {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
                LaunchScript::from_json(&text)?
            }
            None => LaunchScript::mock_default(),
        };

        let conditions = self.live_conditions.len();
        if conditions != 0 && conditions != script.len() {
            return Err(LaunchError::TriggerMismatch {
                steps: script.len(),
                conditions,
            }
            .into());
        }
        Ok(script)
    }

    /// Parser settings for each port session.
    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            checksum: self.checksum,
            max_buffer: self.max_frame_buffer,
        }
    }

    /// Simulator settings.
    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            rate_hz: self.simulator_rate_hz,
            corrupt_every: self.simulator_corrupt_every,
            checksum: self.checksum,
            ..SimConfig::default()
        }
    }

    /// Read timeout as a `Duration`.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
