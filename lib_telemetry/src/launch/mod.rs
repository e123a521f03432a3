//! # Launch Sequencing
//!
//! The console-narrated launch state machine.
//!
//! ## Core Components:
//!
//! - **`state`**: `LaunchState` and its legal edges.
//! - **`script`**: Validated step lists, the built-in countdown and JSON
//!   loading.
//! - **`trigger`**: When a step may fire (`ScriptedTrigger` for mock runs,
//!   `TelemetryTrigger` for live ones).
//! - **`sequencer`**: One run of a script.
//! - **`controller`**: Replaces the sequencer on every `start`.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Run management across successive launches.
pub mod controller;
/// Launch errors.
pub mod error;
/// Step lists.
pub mod script;
/// A single run.
pub mod sequencer;
/// The launch state machine.
pub mod state;
/// Step trigger strategies.
pub mod trigger;

// --- Public API Re-exports ---
pub use controller::{LaunchController, LaunchMode};
pub use error::LaunchError;
pub use script::{LaunchScript, LaunchStep, StepEffect};
pub use sequencer::{FiredStep, LaunchSequencer};
pub use state::LaunchState;
pub use trigger::{ScriptedTrigger, StepTrigger, TelemetryCondition, TelemetryTrigger};
