// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark run state machine with typed state transitions.
//!
//! Implements the run lifecycle:
//! Idle → Setup → {ForkStarting → Warmup → Measuring → Aggregating}* → Reporting → Done.
//! Any non-terminal state may move to Failed. Invalid transitions result in
//! StateTransitionError.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::StateTransitionError;

/// Run lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing has happened yet.
    Idle,

    /// Building resolvers and checking scenario integrity.
    Setup,

    /// An isolated fork is being launched for the current scenario.
    ForkStarting,

    /// Discarded iterations are running inside the fork.
    Warmup,

    /// Counted iterations are running inside the fork.
    Measuring,

    /// Fork samples for the current scenario are being combined.
    Aggregating,

    /// Report entries are being emitted.
    Reporting,

    /// Run finished.
    Done,

    /// Run aborted by a fatal error.
    Failed,
}

impl RunState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Setup => "Setup",
            Self::ForkStarting => "ForkStarting",
            Self::Warmup => "Warmup",
            Self::Measuring => "Measuring",
            Self::Aggregating => "Aggregating",
            Self::Reporting => "Reporting",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: RunState) -> bool {
        if !self.is_terminal() && target == Self::Failed {
            return true;
        }

        matches!(
            (self, target),
            (Self::Idle, Self::Setup) |
            // First scenario, or an empty matrix
            (Self::Setup, Self::ForkStarting) |
            (Self::Setup, Self::Reporting) |
            // A lost fork is followed by the next fork, or by aggregation
            (Self::ForkStarting, Self::Warmup) |
            (Self::ForkStarting, Self::ForkStarting) |
            (Self::ForkStarting, Self::Aggregating) |
            (Self::Warmup, Self::Measuring) |
            (Self::Measuring, Self::ForkStarting) |
            (Self::Measuring, Self::Aggregating) |
            // Next scenario, or all scenarios done
            (Self::Aggregating, Self::ForkStarting) |
            (Self::Aggregating, Self::Reporting) |
            (Self::Reporting, Self::Done)
        )
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State machine for one benchmark run.
/// Enforces valid state transitions and tracks elapsed run time.
#[derive(Debug)]
pub struct RunStateMachine {
    current_state: RunState,
    started_at: Instant,
    transition_count: u64,
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: RunState::Idle,
            started_at: Instant::now(),
            transition_count: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.current_state
    }

    /// Wall-clock time since the machine was created.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: RunState) -> Result<(), StateTransitionError> {
        if self.current_state.is_terminal() {
            return Err(StateTransitionError::TerminalState {
                state: self.current_state.name(),
            });
        }

        if !self.current_state.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                from: self.current_state.name(),
                to: target.name(),
            });
        }

        tracing::trace!(
            from = self.current_state.name(),
            to = target.name(),
            "Run state transition"
        );

        self.current_state = target;
        self.transition_count += 1;

        Ok(())
    }

    /// Move to Failed. A no-op if the run already ended.
    pub fn fail(&mut self) {
        if !self.current_state.is_terminal() {
            self.current_state = RunState::Failed;
            self.transition_count += 1;
        }
    }
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let sm = RunStateMachine::new();
        assert_eq!(sm.state(), RunState::Idle);
        assert_eq!(sm.transition_count(), 0);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut sm = RunStateMachine::new();
        let path = [
            RunState::Setup,
            RunState::ForkStarting,
            RunState::Warmup,
            RunState::Measuring,
            RunState::ForkStarting,
            RunState::Warmup,
            RunState::Measuring,
            RunState::Aggregating,
            RunState::ForkStarting,
            RunState::ForkStarting,
            RunState::Aggregating,
            RunState::Reporting,
            RunState::Done,
        ];
        for state in path {
            assert!(sm.transition_to(state).is_ok(), "-> {}", state);
        }
        assert_eq!(sm.transition_count(), path.len() as u64);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut sm = RunStateMachine::new();
        assert!(sm.transition_to(RunState::Measuring).is_err());
        assert_eq!(sm.state(), RunState::Idle);

        sm.transition_to(RunState::Setup).unwrap();
        sm.transition_to(RunState::ForkStarting).unwrap();
        // Warmup must complete before reporting
        assert!(sm.transition_to(RunState::Reporting).is_err());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut sm = RunStateMachine::new();
        sm.transition_to(RunState::Setup).unwrap();
        sm.fail();
        assert_eq!(sm.state(), RunState::Failed);
        assert!(matches!(
            sm.transition_to(RunState::Reporting),
            Err(StateTransitionError::TerminalState { .. })
        ));
    }
}
