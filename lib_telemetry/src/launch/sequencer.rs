//! # Launch Sequencer
//!
//! One sequencer narrates one run of a script into the console log.
//!
//! ## Core Design Principles:
//!
//! 1.  **Single Run**: A sequencer goes `Idle -> Running` once and
//!     ends in `Complete` or `Aborted`. The next run gets a new sequencer from
//!     the `LaunchController`.
//!
//! 2.  **Abort Is Final**: A step appends its entry only after re-checking the
//!     state under the run lock, and `abort()` flips the state under that same
//!     lock. Once `abort()` returns, nothing from the run reaches the console.
//!
//! 3.  **Owned Task**: The step task is cancelled through a
//!     `CancellationToken` when the run is aborted or the sequencer dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::{ConsoleLog, EventBus, StationEvent};
use crate::launch::error::LaunchError;
use crate::launch::script::{LaunchScript, StepEffect};
use crate::launch::state::LaunchState;
use crate::launch::trigger::StepTrigger;

/// A step that has been narrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiredStep {
    /// Position in the script.
    pub index: usize,
    /// Scheduled offset from the start of the run.
    pub offset_ms: u64,
    /// Measured time from the start of the run.
    pub elapsed: Duration,
    /// The narrated text.
    pub text: String,
}

struct RunShared {
    state: LaunchState,
    started_at: Option<Instant>,
    liftoff_at: Option<Instant>,
    fired: Vec<FiredStep>,
}

/// # Launch Sequencer
pub struct LaunchSequencer {
    script: Arc<LaunchScript>,
    console: Arc<ConsoleLog>,
    bus: EventBus,
    run: Arc<Mutex<RunShared>>,
    state_tx: watch::Sender<LaunchState>,
    cancel: CancellationToken,
}

impl LaunchSequencer {
    /// Creates an idle sequencer for `script`.
    pub fn new(script: Arc<LaunchScript>, console: Arc<ConsoleLog>, bus: EventBus) -> Self {
        let (state_tx, _) = watch::channel(LaunchState::Idle);
        Self {
            script,
            console,
            bus,
            run: Arc::new(Mutex::new(RunShared {
                state: LaunchState::Idle,
                started_at: None,
                liftoff_at: None,
                fired: Vec::new(),
            })),
            state_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Arms the run and starts firing steps through `trigger`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, mut trigger: Box<dyn StepTrigger>) -> Result<(), LaunchError> {
        let started = {
            let mut run = lock(&self.run);
            if run.state.is_active() {
                return Err(LaunchError::AlreadyRunning);
            }
            let running = run.state.transition(LaunchState::Running)?;
            self.set_state(&mut run, running);

            let now = Instant::now();
            run.started_at = Some(now);
            now
        };
        log::info!("Launch sequence started ({} steps)", self.script.len());

        let script = Arc::clone(&self.script);
        let console = Arc::clone(&self.console);
        let bus = self.bus.clone();
        let run = Arc::clone(&self.run);
        let state_tx = self.state_tx.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let last = script.len() - 1;
            for (index, step) in script.steps().iter().enumerate() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    _ = trigger.wait(index, step, started) => {}
                }

                let mut guard = lock(&run);
                if guard.state != LaunchState::Running {
                    return;
                }
                console.info(step.text.clone());
                guard.fired.push(FiredStep {
                    index,
                    offset_ms: step.offset_ms,
                    elapsed: started.elapsed(),
                    text: step.text.clone(),
                });
                if step.effect == Some(StepEffect::Liftoff) {
                    guard.liftoff_at = Some(Instant::now());
                    log::info!("Liftoff at step {}", index);
                }
                if index == last {
                    guard.state = LaunchState::Complete;
                    state_tx.send_replace(LaunchState::Complete);
                    bus.publish(StationEvent::LaunchChanged(LaunchState::Complete));
                    bus.publish(StationEvent::RunFlagChanged(false));
                    log::info!("Launch sequence complete");
                }
            }
        });
        Ok(())
    }

    /// Stops the run. Returns `false` when no run is active.
    pub fn abort(&self) -> bool {
        let mut run = lock(&self.run);
        let Ok(aborted) = run.state.transition(LaunchState::Aborted) else {
            return false;
        };
        self.set_state(&mut run, aborted);
        self.cancel.cancel();
        self.console.info("Launch sequence aborted");
        log::warn!("Launch sequence aborted after {} steps", run.fired.len());
        true
    }

    /// Current state.
    pub fn state(&self) -> LaunchState {
        lock(&self.run).state
    }

    /// True while steps are being fired. This is the externally observed
    /// run flag.
    pub fn is_running(&self) -> bool {
        self.state() == LaunchState::Running
    }

    /// True while armed or running.
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Steps narrated so far.
    pub fn fired_steps(&self) -> Vec<FiredStep> {
        lock(&self.run).fired.clone()
    }

    /// Time since the liftoff step fired.
    pub fn mission_elapsed(&self) -> Option<Duration> {
        lock(&self.run).liftoff_at.map(|at| at.elapsed())
    }

    /// Time since the run started.
    pub fn run_elapsed(&self) -> Option<Duration> {
        lock(&self.run).started_at.map(|at| at.elapsed())
    }

    /// The script this sequencer narrates.
    pub fn script(&self) -> &LaunchScript {
        &self.script
    }

    /// Resolves once the run reaches a terminal state.
    pub async fn finished(&self) -> LaunchState {
        let mut rx = self.state_tx.subscribe();
        let state = match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }

    fn set_state(&self, run: &mut RunShared, next: LaunchState) {
        let was_running = run.state == LaunchState::Running;
        run.state = next;
        self.state_tx.send_replace(next);
        self.bus.publish(StationEvent::LaunchChanged(next));

        let running = next == LaunchState::Running;
        if running != was_running {
            self.bus.publish(StationEvent::RunFlagChanged(running));
        }
    }
}

impl Drop for LaunchSequencer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn lock(run: &Mutex<RunShared>) -> MutexGuard<'_, RunShared> {
    run.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::script::LaunchStep;
    use crate::launch::trigger::ScriptedTrigger;

    fn sequencer(steps: Vec<LaunchStep>) -> (LaunchSequencer, Arc<ConsoleLog>) {
        let bus = EventBus::default();
        let console = Arc::new(ConsoleLog::new(100, bus.clone()));
        let script = Arc::new(LaunchScript::new(steps).unwrap());
        (LaunchSequencer::new(script, Arc::clone(&console), bus), console)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_every_step_then_completes() {
        let (seq, console) = sequencer(vec![
            LaunchStep::new(0, "one"),
            LaunchStep::new(100, "two").with_effect(StepEffect::Liftoff),
            LaunchStep::new(300, "three"),
        ]);
        seq.start(Box::new(ScriptedTrigger)).unwrap();
        assert!(seq.is_running());

        assert_eq!(seq.finished().await, LaunchState::Complete);
        assert_eq!(console.texts(), vec!["one", "two", "three"]);
        assert!(!seq.is_running());
        assert!(seq.mission_elapsed().is_some());

        let offsets: Vec<u64> = seq.fired_steps().iter().map(|s| s.offset_ms).collect();
        assert_eq!(offsets, vec![0, 100, 300]);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_stops_further_steps() {
        let (seq, console) = sequencer(vec![
            LaunchStep::new(0, "one"),
            LaunchStep::new(1000, "two"),
            LaunchStep::new(2000, "three"),
        ]);
        seq.start(Box::new(ScriptedTrigger)).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(seq.abort());
        assert_eq!(seq.state(), LaunchState::Aborted);
        let after_abort = console.len();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(console.len(), after_abort);
        assert_eq!(
            console.texts(),
            vec!["one", "two", "Launch sequence aborted"]
        );
        assert!(!seq.abort());
        assert_eq!(seq.finished().await, LaunchState::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected() {
        let (seq, _) = sequencer(vec![LaunchStep::new(1000, "one")]);
        seq.start(Box::new(ScriptedTrigger)).unwrap();
        assert_eq!(
            seq.start(Box::new(ScriptedTrigger)),
            Err(LaunchError::AlreadyRunning)
        );
        seq.finished().await;

        // A finished sequencer cannot be restarted.
        assert_eq!(
            seq.start(Box::new(ScriptedTrigger)),
            Err(LaunchError::InvalidTransition {
                from: LaunchState::Complete,
                to: LaunchState::Running
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_flag_follows_running_state() {
        let bus = EventBus::default();
        let mut events = bus.subscribe();
        let console = Arc::new(ConsoleLog::new(10, bus.clone()));
        let script = Arc::new(LaunchScript::new(vec![LaunchStep::new(10, "only")]).unwrap());
        let seq = LaunchSequencer::new(script, console, bus);

        seq.start(Box::new(ScriptedTrigger)).unwrap();
        seq.finished().await;

        let mut flags = Vec::new();
        let mut states = Vec::new();
        while let Some(event) = events.try_recv() {
            match event {
                StationEvent::RunFlagChanged(flag) => flags.push(flag),
                StationEvent::LaunchChanged(state) => states.push(state),
                _ => {}
            }
        }
        assert_eq!(flags, vec![true, false]);
        assert_eq!(states, vec![LaunchState::Running, LaunchState::Complete]);
    }
}
