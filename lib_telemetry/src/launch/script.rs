//! # Launch Scripts
//!
//! A script is the ordered list of narrated steps a run fires. Scripts are
//! validated once, when built, so the sequencer never sees an empty or
//! out-of-order script.
//!
//! Scripts load from JSON:
//!
//! ```json
//! [
//!   { "offsetMs": 0, "text": "Initializing launch sequence..." },
//!   { "offsetMs": 8000, "text": "Ignition", "effect": "liftoff" }
//! ]
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::launch::error::LaunchError;

/// Side effect attached to a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepEffect {
    /// Starts the mission clock.
    Liftoff,
}

/// One narrated step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchStep {
    /// Delay from the start of the run.
    pub offset_ms: u64,
    /// Console text.
    pub text: String,
    /// Optional side effect applied when the step fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<StepEffect>,
}

impl LaunchStep {
    /// A step without side effects.
    pub fn new(offset_ms: u64, text: impl Into<String>) -> Self {
        Self {
            offset_ms,
            text: text.into(),
            effect: None,
        }
    }

    /// Attaches `effect`.
    pub fn with_effect(mut self, effect: StepEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    /// The offset as a `Duration`.
    pub fn offset(&self) -> Duration {
        Duration::from_millis(self.offset_ms)
    }
}

/// # Launch Script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LaunchStep>", into = "Vec<LaunchStep>")]
pub struct LaunchScript {
    steps: Vec<LaunchStep>,
}

impl LaunchScript {
    /// Validates and wraps `steps`.
    pub fn new(steps: Vec<LaunchStep>) -> Result<Self, LaunchError> {
        if steps.is_empty() {
            return Err(LaunchError::EmptyScript);
        }
        if let Some(index) = steps
            .windows(2)
            .position(|pair| pair[1].offset_ms < pair[0].offset_ms)
        {
            return Err(LaunchError::UnorderedSteps {
                index: index + 1,
                offset_ms: steps[index + 1].offset_ms,
            });
        }
        Ok(Self { steps })
    }

    /// Parses a JSON step array.
    pub fn from_json(text: &str) -> Result<Self, LaunchError> {
        let steps: Vec<LaunchStep> =
            serde_json::from_str(text).map_err(|e| LaunchError::InvalidScript(e.to_string()))?;
        Self::new(steps)
    }

    /// The built-in countdown narrated by mock runs.
    pub fn mock_default() -> Self {
        Self {
            steps: vec![
                LaunchStep::new(0, "Initializing launch sequence..."),
                LaunchStep::new(1000, "Running pre-flight checks..."),
                LaunchStep::new(2500, "Telemetry link nominal"),
                LaunchStep::new(4000, "Arming igniter"),
                LaunchStep::new(5000, "T-minus 3"),
                LaunchStep::new(6000, "T-minus 2"),
                LaunchStep::new(7000, "T-minus 1"),
                LaunchStep::new(8000, "Ignition").with_effect(StepEffect::Liftoff),
                LaunchStep::new(9000, "Liftoff confirmed"),
                LaunchStep::new(12000, "Launch sequence complete"),
            ],
        }
    }

    /// The steps in firing order.
    pub fn steps(&self) -> &[LaunchStep] {
        &self.steps
    }

    /// Number of steps. Never zero.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Offset of the last step.
    pub fn duration(&self) -> Duration {
        self.steps.last().map(LaunchStep::offset).unwrap_or_default()
    }
}

impl TryFrom<Vec<LaunchStep>> for LaunchScript {
    type Error = LaunchError;

    fn try_from(steps: Vec<LaunchStep>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<LaunchScript> for Vec<LaunchStep> {
    fn from(script: LaunchScript) -> Self {
        script.steps
    }
}
