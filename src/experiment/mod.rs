//! Experiment orchestration.
//!
//! - [`component`]: registration of configurable and observable instruments
//! - [`runner`]: one sweep over the registered components
//! - [`sequencer`]: an ordered list of runs, each a sweep under a restored snapshot
//! - [`progress`]: step counting with time estimates
//! - [`documentation`]: markdown description of recorded values

pub mod component;
pub mod documentation;
pub mod progress;
pub mod runner;
pub mod sequencer;
pub mod state;

pub use component::{verify_names, ComponentSpec, ManagedComponent, ObservableSpec};
pub use progress::ProgressTracker;
pub use runner::{ExperimentRunner, RunnerConfig, StepReport};
pub use sequencer::{ExperimentSequencer, Run, Sequence};
pub use state::{RunnerState, SequenceOutcome, SequenceState};
