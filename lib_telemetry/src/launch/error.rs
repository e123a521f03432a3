use thiserror::Error;

use crate::launch::state::LaunchState;

/// # Launch Error
///
/// Every variant leaves the current run untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    /// A run is already armed or running.
    #[error("launch sequence already running")]
    AlreadyRunning,

    /// The requested state change is not an edge of the state machine.
    #[error("invalid launch transition {from} -> {to}")]
    InvalidTransition {
        /// State before the change.
        from: LaunchState,
        /// Requested state.
        to: LaunchState,
    },

    /// Live mode needs an open port to watch.
    #[error("live launch requires an open telemetry link")]
    LinkRequired,

    /// A script must narrate at least one step.
    #[error("launch script has no steps")]
    EmptyScript,

    /// Step offsets must not decrease.
    #[error("launch step {index} at {offset_ms} ms is scheduled before the step preceding it")]
    UnorderedSteps {
        /// Zero-based index of the offending step.
        index: usize,
        /// Its offset.
        offset_ms: u64,
    },

    /// Live conditions must line up with the script steps.
    #[error("launch script has {steps} steps but {conditions} live conditions")]
    TriggerMismatch {
        /// Steps in the script.
        steps: usize,
        /// Conditions supplied.
        conditions: usize,
    },

    /// The script text could not be parsed.
    #[error("invalid launch script: {0}")]
    InvalidScript(String),
}
