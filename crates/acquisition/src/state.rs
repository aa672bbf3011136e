//! Reader state machine
//!
//! ```text
//! Idle -> Configuring -> Running -> Draining -> Terminated
//!              |            |           |
//!              +----------> Faulted <---+
//!                              |
//!                              +-----> Terminated
//! ```
//!
//! A failure while draining (teardown, sink close, ack send) moves the run to
//! `Faulted`, so the controller still sees exactly one of Ack or Fault.

use std::fmt;

use contracts::{AcquisitionError, RunId};
use tracing::debug;

/// Lifecycle state of one reader run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderState {
    Idle,
    Configuring,
    Running,
    Draining,
    Faulted,
    Terminated,
}

impl ReaderState {
    pub fn can_transition_to(self, next: ReaderState) -> bool {
        use ReaderState::*;
        matches!(
            (self, next),
            (Idle, Configuring)
                | (Configuring, Running)
                | (Configuring, Faulted)
                | (Running, Draining)
                | (Running, Faulted)
                | (Draining, Terminated)
                | (Draining, Faulted)
                | (Faulted, Terminated)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ReaderState::Terminated
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Configuring => "configuring",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Faulted => "faulted",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus the path taken to reach it
#[derive(Debug, Clone)]
pub struct StateTracker {
    run_id: RunId,
    current: ReaderState,
    history: Vec<ReaderState>,
}

impl StateTracker {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            current: ReaderState::Idle,
            history: vec![ReaderState::Idle],
        }
    }

    pub fn current(&self) -> ReaderState {
        self.current
    }

    pub fn history(&self) -> &[ReaderState] {
        &self.history
    }

    /// Move to `next`
    ///
    /// # Errors
    /// Returns `AcquisitionError::Runtime` for a transition the machine does not allow.
    pub fn advance(&mut self, next: ReaderState) -> Result<(), AcquisitionError> {
        if !self.current.can_transition_to(next) {
            return Err(AcquisitionError::runtime(format!(
                "illegal reader transition {} -> {}",
                self.current, next
            )));
        }
        debug!(run_id = self.run_id, from = %self.current, to = %next, "Reader state transition");
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}
