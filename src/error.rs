//! Custom error types for the sweep engine.
//!
//! Two enums cover everything the core can report:
//!
//! - **`ScheduleError`**: construction and misuse of the sweep odometer. These are
//!   programming errors (mismatched arities, uneven coupled sources, advancing a
//!   poisoned schedule) and are never swallowed by the runner.
//! - **`SweepError`**: everything the runner and sequencer surface. Instrument
//!   failures arrive as `anyhow::Error` from the capability traits and are wrapped
//!   with the component name so rows, logs and the final outcome can say which
//!   device failed.
//!
//! `SweepError::Multiple` carries every failure of one dispatch phase when more than
//! one concurrent task failed, ordered by submission.

use std::fmt;
use thiserror::Error;

/// Convenience alias for results using the engine error type.
pub type AppResult<T> = std::result::Result<T, SweepError>;

/// Lifecycle hook that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// `Instrument::initialize`
    Initialize,
    /// `Instrument::finalize`
    Finalize,
    /// `Instrument::set_config`
    ApplyConfig,
    /// `Instrument::get_config`
    CaptureConfig,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecyclePhase::Initialize => write!(f, "initialize"),
            LifecyclePhase::Finalize => write!(f, "finalize"),
            LifecyclePhase::ApplyConfig => write!(f, "set_config"),
            LifecyclePhase::CaptureConfig => write!(f, "get_config"),
        }
    }
}

/// Errors raised while building or driving a [`crate::sweep::SweepSchedule`].
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// Schedule built from an empty entry list.
    #[error("Sweep schedule needs at least one point source")]
    NoSources,

    /// Sources and consumers of a group differ in count.
    #[error("Sync group needs one consumer per source ({sources} sources, {consumers} consumers)")]
    ArityMismatch {
        /// Number of sources given.
        sources: usize,
        /// Number of consumers given.
        consumers: usize,
    },

    /// Sources sharing a level declare different lengths.
    #[error("Coupled sources at level {level} declare different lengths: {lengths:?}")]
    UnevenCoupling {
        /// Offending coupling level.
        level: i32,
        /// Declared length of each source at that level.
        lengths: Vec<usize>,
    },

    /// A fresh cursor yielded no point.
    #[error("Point source at level {level} yielded nothing after restart")]
    EmptyCycle {
        /// Level of the empty source.
        level: i32,
    },

    /// `start()` called twice.
    #[error("Sweep schedule was already started")]
    AlreadyStarted,

    /// `advance()` after a consumer failed.
    #[error("Sweep schedule is unusable after a consumer failure")]
    Poisoned,

    /// A consumer returned an error.
    #[error("Consumer at level {level} failed: {source}")]
    Consumer {
        /// Level of the failing group.
        level: i32,
        /// Error returned by the consumer.
        #[source]
        source: anyhow::Error,
    },
}

/// Errors surfaced by the dispatcher, runner and sequencer.
#[derive(Error, Debug)]
pub enum SweepError {
    /// Schedule construction or misuse.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// A configurable's `configure` call failed.
    #[error("Configuration of '{component}' failed: {source}")]
    Configuration {
        /// Registered component name.
        component: String,
        /// Error reported by the instrument.
        #[source]
        source: anyhow::Error,
    },

    /// An observable's `observe` call failed.
    #[error("Observation of '{component}' failed: {source}")]
    Observation {
        /// Registered component name.
        component: String,
        /// Error reported by the instrument.
        #[source]
        source: anyhow::Error,
    },

    /// Initialize, finalize or a config snapshot call failed.
    #[error("'{component}' failed during {phase}: {source}")]
    Lifecycle {
        /// Registered component name.
        component: String,
        /// Call that failed.
        phase: LifecyclePhase,
        /// Error reported by the instrument.
        #[source]
        source: anyhow::Error,
    },

    /// Several tasks of one dispatch phase failed, in submission order.
    #[error("{} dispatched tasks failed; first: {}", .0.len(), first_message(.0))]
    Multiple(Vec<SweepError>),

    /// A dispatched task panicked or was cancelled.
    #[error("Dispatched task panicked: {0}")]
    TaskPanicked(String),

    /// `run_sweep` before `setup_schedule`.
    #[error("Runner has no sweep schedule; call setup_schedule first")]
    NotReady,

    /// Field written before any row was begun.
    #[error("No row has been started in the data repository")]
    NoActiveRow,

    /// Name registered twice.
    #[error("Duplicate component name: {0}")]
    DuplicateName(String),

    /// Name collides with a reserved row key.
    #[error("Component name '{0}' is reserved")]
    ReservedName(String),

    /// Run snapshot names a component that is not registered.
    #[error("Run snapshot names unknown component '{0}'")]
    UnknownComponent(String),

    /// Invalid configuration value.
    #[error("Invalid settings: {0}")]
    Settings(String),

    /// File access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn first_message(errors: &[SweepError]) -> String {
    errors
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

impl SweepError {
    /// First underlying failure, descending into [`SweepError::Multiple`].
    pub fn first(&self) -> &SweepError {
        match self {
            SweepError::Multiple(errors) => errors.first().map_or(self, SweepError::first),
            other => other,
        }
    }

    /// Component the failure is attributed to, if any.
    pub fn component(&self) -> Option<&str> {
        match self.first() {
            SweepError::Configuration { component, .. }
            | SweepError::Observation { component, .. }
            | SweepError::Lifecycle { component, .. } => Some(component),
            SweepError::UnknownComponent(name) => Some(name),
            _ => None,
        }
    }
}
