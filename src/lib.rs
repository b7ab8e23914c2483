//! # Sweep DAQ Core Library
//!
//! Engine for multi-axis parameter sweeps over laboratory instruments. A set of
//! configurable devices each offer a sequence of parameter points; observable
//! devices record a measurement at every combination.
//!
//! ## Crate Structure
//!
//! - **`sweep`**: the odometer. `SweepSchedule` walks the combined point space of
//!   all configurables, grouped by coupling level, with higher levels varying faster.
//! - **`dispatcher`**: runs the configure and observe calls of one step concurrently.
//! - **`data`**: the append-only `DataRepository` log and its flat table view.
//! - **`experiment`**: `ExperimentRunner` executes one sweep, `ExperimentSequencer`
//!   replays a list of captured configuration snapshots.
//! - **`hardware`**: the `Instrument`, `Configurable` and `Observable` traits plus
//!   simulated devices.
//! - **`session`**: saving and loading run sequences as JSON.
//! - **`config`** / **`logging`**: figment configuration and tracing setup.
//! - **`error`**: `SweepError` and `ScheduleError`.

pub mod config;
pub mod data;
pub mod dispatcher;
pub mod error;
pub mod experiment;
pub mod hardware;
pub mod logging;
pub mod session;
pub mod sweep;

pub use error::{AppResult, ScheduleError, SweepError};
