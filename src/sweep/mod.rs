//! Coupled point-space iteration.
//!
//! - [`point`]: restartable point sources
//! - [`sync_group`]: sources sharing a coupling level, advanced in lockstep
//! - [`schedule`]: the odometer composing groups into nested loops

pub mod point;
pub mod schedule;
pub mod sync_group;

pub use point::{FnSource, PointCursor, PointSource, VecSource};
pub use schedule::{ScheduleEntry, SweepSchedule};
pub use sync_group::{Consumer, GroupStep, SyncGroup};
