//! Device contracts and simulated devices.
//!
//! - [`capabilities`]: the `Instrument`, `Configurable` and `Observable` traits
//! - [`mock`]: simulated devices for demos and tests

pub mod capabilities;
pub mod mock;

pub use capabilities::{Configurable, Instrument, Observable, PointArgs};
