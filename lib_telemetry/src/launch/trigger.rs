//! # Step Triggers
//!
//! A `StepTrigger` decides when the sequencer may fire the next step. Mock
//! runs use wall-clock offsets only; live runs additionally wait for the
//! incoming telemetry to satisfy a condition.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

use crate::core::TelemetryRecord;
use crate::launch::error::LaunchError;
use crate::launch::script::{LaunchScript, LaunchStep};

/// Waits until step `index` may fire. `started` is the instant the run began.
pub trait StepTrigger: Send {
    /// Resolves when the step is due. Dropping the future cancels the wait.
    fn wait<'a>(&'a mut self, index: usize, step: &'a LaunchStep, started: Instant) -> BoxFuture<'a, ()>;
}

/// Fires each step at its offset from the start of the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedTrigger;

impl StepTrigger for ScriptedTrigger {
    fn wait<'a>(&'a mut self, _index: usize, step: &'a LaunchStep, started: Instant) -> BoxFuture<'a, ()> {
        Box::pin(sleep_until(started + step.offset()))
    }
}

/// A predicate over the latest telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TelemetryCondition {
    /// Acceleration magnitude of at least `mps2`.
    AccelAtLeast {
        /// Threshold in m/s².
        mps2: f64,
    },
    /// Device mission clock of at least `seconds`.
    MissionTimeAtLeast {
        /// Threshold in seconds.
        seconds: f64,
    },
    /// At least `count` satellites in view.
    SatellitesAtLeast {
        /// Minimum satellite count.
        count: u8,
    },
    /// Battery charge of at least `pct`.
    BatteryAtLeast {
        /// Minimum charge in percent.
        pct: f64,
    },
}

impl TelemetryCondition {
    /// True when `record` satisfies the condition. Missing fields never do.
    pub fn is_met(&self, record: &TelemetryRecord) -> bool {
        match *self {
            TelemetryCondition::AccelAtLeast { mps2 } => record.accel_magnitude().is_some_and(|a| a >= mps2),
            TelemetryCondition::MissionTimeAtLeast { seconds } => {
                record.mission_time_s.is_some_and(|t| t >= seconds)
            }
            TelemetryCondition::SatellitesAtLeast { count } => record.satellite_count.is_some_and(|n| n >= count),
            TelemetryCondition::BatteryAtLeast { pct } => record.battery_pct.is_some_and(|b| b >= pct),
        }
    }
}

impl fmt::Display for TelemetryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryCondition::AccelAtLeast { mps2 } => write!(f, "|accel| >= {mps2} m/s²"),
            TelemetryCondition::MissionTimeAtLeast { seconds } => write!(f, "mission time >= {seconds} s"),
            TelemetryCondition::SatellitesAtLeast { count } => write!(f, "satellites >= {count}"),
            TelemetryCondition::BatteryAtLeast { pct } => write!(f, "battery >= {pct}%"),
        }
    }
}

/// # Telemetry Trigger
///
/// Each step first waits for its offset, then for its condition (if any) to
/// hold on the latest record. If the telemetry source goes away the step
/// never fires; the run can still be aborted.
pub struct TelemetryTrigger {
    telemetry: watch::Receiver<Arc<TelemetryRecord>>,
    conditions: Vec<Option<TelemetryCondition>>,
}

impl TelemetryTrigger {
    /// Builds a trigger for `script`. `conditions` is either empty (offsets
    /// only) or holds one entry per step.
    pub fn for_script(
        script: &LaunchScript,
        telemetry: watch::Receiver<Arc<TelemetryRecord>>,
        conditions: Vec<Option<TelemetryCondition>>,
    ) -> Result<Self, LaunchError> {
        if !conditions.is_empty() && conditions.len() != script.len() {
            return Err(LaunchError::TriggerMismatch {
                steps: script.len(),
                conditions: conditions.len(),
            });
        }
        Ok(Self { telemetry, conditions })
    }
}

impl StepTrigger for TelemetryTrigger {
    fn wait<'a>(&'a mut self, index: usize, step: &'a LaunchStep, started: Instant) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            sleep_until(started + step.offset()).await;

            let Some(condition) = self.conditions.get(index).copied().flatten() else {
                return;
            };
            log::debug!("Step {} waiting for {}", index, condition);
            loop {
                let met = condition.is_met(&self.telemetry.borrow_and_update());
                if met {
                    return;
                }
                if self.telemetry.changed().await.is_err() {
                    log::warn!("Telemetry source closed while waiting for {}", condition);
                    std::future::pending::<()>().await;
                }
            }
        })
    }
}
