use std::fmt;

use serde::Serialize;

use crate::launch::error::LaunchError;

/// # Launch State
///
/// ```text
/// Idle -> Running -> Complete
///              |
///              +----> Aborted
/// ```
///
/// `Aborted` and `Complete` are terminal. `Armed` is part of the state set
/// for an explicit arming step; no edge leads into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum LaunchState {
    /// No run has started.
    #[default]
    Idle,
    /// Reserved for an explicit arming step; never entered.
    Armed,
    /// Steps are being fired.
    Running,
    /// The operator stopped the run.
    Aborted,
    /// Every step fired.
    Complete,
}

impl LaunchState {
    /// True when `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: LaunchState) -> bool {
        use LaunchState::*;
        matches!(
            (self, next),
            (Idle, Running) | (Running, Aborted) | (Running, Complete)
        )
    }

    /// Returns `next` if the edge exists.
    pub fn transition(self, next: LaunchState) -> Result<LaunchState, LaunchError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(LaunchError::InvalidTransition { from: self, to: next })
        }
    }

    /// True for `Aborted` and `Complete`.
    pub fn is_terminal(self) -> bool {
        matches!(self, LaunchState::Aborted | LaunchState::Complete)
    }

    /// True for `Armed` and `Running`.
    pub fn is_active(self) -> bool {
        matches!(self, LaunchState::Armed | LaunchState::Running)
    }
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LaunchState::Idle => "IDLE",
            LaunchState::Armed => "ARMED",
            LaunchState::Running => "RUNNING",
            LaunchState::Aborted => "ABORTED",
            LaunchState::Complete => "COMPLETE",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [LaunchState; 5] = [
        LaunchState::Idle,
        LaunchState::Armed,
        LaunchState::Running,
        LaunchState::Aborted,
        LaunchState::Complete,
    ];

    #[test]
    fn terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|state| state.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn start_goes_straight_to_running() {
        let state = LaunchState::Idle
            .transition(LaunchState::Running)
            .and_then(|s| s.transition(LaunchState::Complete));
        assert_eq!(state, Ok(LaunchState::Complete));
        assert_eq!(
            LaunchState::Running.transition(LaunchState::Aborted),
            Ok(LaunchState::Aborted)
        );
    }

    #[test]
    fn nothing_enters_armed() {
        for from in ALL {
            assert!(!from.can_transition_to(LaunchState::Armed), "{from} -> ARMED");
        }
        assert_eq!(
            LaunchState::Idle.transition(LaunchState::Armed),
            Err(LaunchError::InvalidTransition {
                from: LaunchState::Idle,
                to: LaunchState::Armed
            })
        );
        assert!(!LaunchState::Idle.can_transition_to(LaunchState::Aborted));
    }
}
