//! Runner and sequencer lifecycle states.

use crate::error::SweepError;
use serde::{Deserialize, Serialize};

/// Lifecycle of one [`ExperimentRunner`](super::ExperimentRunner) sweep.
///
/// # State Machine
///
/// ```text
/// Idle ──setup_schedule──> Ready ──run_sweep──> Running ──> Stopped
///                            ▲                     │
///                            └───setup_schedule────┴──────> Errored
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunnerState {
    /// No schedule built yet
    Idle,
    /// Schedule built, sweep not started
    Ready,
    /// Sweep in progress
    Running,
    /// Sweep exhausted or stopped on request
    Stopped,
    /// Sweep ended by a captured error
    Errored,
}

impl std::fmt::Display for RunnerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerState::Idle => write!(f, "Idle"),
            RunnerState::Ready => write!(f, "Ready"),
            RunnerState::Running => write!(f, "Running"),
            RunnerState::Stopped => write!(f, "Stopped"),
            RunnerState::Errored => write!(f, "Errored"),
        }
    }
}

impl RunnerState {
    /// Whether `run_sweep` may be called.
    pub fn can_run(&self) -> bool {
        matches!(self, RunnerState::Ready)
    }
}

/// How a sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceState {
    /// Every run executed
    Finished,
    /// A run or lifecycle hook failed
    Errored,
    /// A stop left runs or points unvisited
    StoppedEarly,
}

impl std::fmt::Display for SequenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceState::Finished => write!(f, "Finished"),
            SequenceState::Errored => write!(f, "Errored"),
            SequenceState::StoppedEarly => write!(f, "StoppedEarly"),
        }
    }
}

/// Result of [`ExperimentSequencer::start_sequence`](super::ExperimentSequencer::start_sequence).
#[derive(Debug)]
pub struct SequenceOutcome {
    /// How the sequence ended.
    pub state: SequenceState,
    /// Runs whose sweep ended without error.
    pub runs_completed: usize,
    /// The error that ended the sequence, if any.
    pub error: Option<SweepError>,
}

impl SequenceOutcome {
    /// True when the sequence ended without an error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
