//! Control loop state machine.
//!
//! The capture loop alternates WAITING → DELIVERED → WAITING. A retried
//! fetch stays in WAITING, and STOPPED is only entered from WAITING, where
//! cancellation is checked.

use crate::error::{PpsError, PpsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// States of the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    /// Blocked on (or about to block on) the next pulse.
    #[default]
    Waiting,
    /// A timestamp has been handed to the statistics.
    Delivered,
    /// The loop has exited.
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::Delivered => write!(f, "DELIVERED"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl LoopState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: LoopState) -> bool {
        use LoopState::{Delivered, Stopped, Waiting};

        matches!(
            (self, target),
            (Waiting, Delivered)
                | (Delivered, Waiting)
                // Retry after an interruption or tolerated timeout
                | (Waiting, Waiting)
                | (Waiting, Stopped)
        )
    }
}

/// State machine wrapper that tracks how the loop got where it is.
#[derive(Debug, Clone, Default)]
pub struct LoopStateMachine {
    current: LoopState,
    transition_count: u64,
    retry_count: u64,
}

impl LoopStateMachine {
    /// Create a new state machine starting in WAITING.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.current
    }

    /// Get total number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Number of WAITING → WAITING retries.
    #[must_use]
    pub fn retry_count(&self) -> u64 {
        self.retry_count
    }

    /// Attempt a state transition.
    ///
    /// # Errors
    ///
    /// Returns [`PpsError::InvalidStateTransition`] if `target` is not
    /// reachable from the current state.
    pub fn transition(&mut self, target: LoopState) -> PpsResult<()> {
        if !self.current.can_transition_to(target) {
            return Err(PpsError::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            });
        }
        if self.current == target {
            self.retry_count += 1;
        }
        self.current = target;
        self.transition_count += 1;
        Ok(())
    }
}
