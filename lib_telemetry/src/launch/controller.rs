use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::core::{ConsoleLog, EventBus};
use crate::launch::error::LaunchError;
use crate::launch::script::LaunchScript;
use crate::launch::sequencer::LaunchSequencer;
use crate::launch::state::LaunchState;
use crate::launch::trigger::StepTrigger;

/// How steps are triggered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LaunchMode {
    /// Fixed offsets, no hardware needed.
    #[default]
    Mock,
    /// Offsets plus telemetry conditions from the open port.
    Live,
}

impl fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LaunchMode::Mock => "mock",
            LaunchMode::Live => "live",
        })
    }
}

impl FromStr for LaunchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(LaunchMode::Mock),
            "live" => Ok(LaunchMode::Live),
            other => Err(format!("unknown launch mode '{other}' (expected mock or live)")),
        }
    }
}

/// # Launch Controller
///
/// Holds the current (or most recent) run and builds a fresh
/// `LaunchSequencer` for every `start`.
pub struct LaunchController {
    console: Arc<ConsoleLog>,
    bus: EventBus,
    current: Mutex<Option<Arc<LaunchSequencer>>>,
}

impl LaunchController {
    /// Creates a controller with no run.
    pub fn new(console: Arc<ConsoleLog>, bus: EventBus) -> Self {
        Self {
            console,
            bus,
            current: Mutex::new(None),
        }
    }

    /// Starts a run of `script`. `trigger` is only built once no other run is
    /// active. Every failure is also appended to the console.
    pub fn start<F>(&self, script: Arc<LaunchScript>, trigger: F) -> Result<Arc<LaunchSequencer>, LaunchError>
    where
        F: FnOnce() -> Result<Box<dyn StepTrigger>, LaunchError>,
    {
        let result = self.start_locked(script, trigger);
        if let Err(err) = &result {
            log::warn!("Launch rejected: {}", err);
            self.console.error(err.to_string());
        }
        result
    }

    fn start_locked<F>(&self, script: Arc<LaunchScript>, trigger: F) -> Result<Arc<LaunchSequencer>, LaunchError>
    where
        F: FnOnce() -> Result<Box<dyn StepTrigger>, LaunchError>,
    {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|run| run.is_active()) {
            return Err(LaunchError::AlreadyRunning);
        }
        let trigger = trigger()?;
        let run = Arc::new(LaunchSequencer::new(script, Arc::clone(&self.console), self.bus.clone()));
        run.start(trigger)?;
        *current = Some(Arc::clone(&run));
        Ok(run)
    }

    /// Aborts the active run. Returns `false` when nothing is running.
    pub fn abort(&self) -> bool {
        self.lock().as_ref().is_some_and(|run| run.abort())
    }

    /// State of the current run, `Idle` before the first one.
    pub fn state(&self) -> LaunchState {
        self.lock().as_ref().map_or(LaunchState::Idle, |run| run.state())
    }

    /// The run flag.
    pub fn is_running(&self) -> bool {
        self.state() == LaunchState::Running
    }

    /// The current or most recent run.
    pub fn current(&self) -> Option<Arc<LaunchSequencer>> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<LaunchSequencer>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
