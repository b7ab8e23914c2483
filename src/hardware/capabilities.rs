//! Instrument Contracts
//!
//! The engine talks to devices through three small traits:
//!
//! - [`Instrument`]: lifecycle hooks and configuration snapshots shared by every device
//! - [`Configurable`]: devices that step through a sequence of parameter points
//! - [`Observable`]: devices that record a measurement at every step
//!
//! A motorised stage is `Configurable`, a power meter is `Observable`. A device can
//! implement both and be registered under two names.
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is async (uses #[async_trait]) for everything that may touch hardware
//! - Is thread-safe (requires Send + Sync) and takes `&self`
//! - Uses anyhow::Result for errors
//!
//! Point generation stays synchronous: the sweep schedule asks for a fresh cursor
//! every time a coupling level wraps around, so [`Configurable::points`] must be
//! cheap and must not block on I/O.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Shutter { open: parking_lot::RwLock<bool> }
//!
//! #[async_trait]
//! impl Instrument for Shutter {
//!     async fn get_config(&self) -> Result<Value> { Ok(json!({})) }
//!     async fn set_config(&self, _config: Value) -> Result<()> { Ok(()) }
//! }
//!
//! #[async_trait]
//! impl Configurable for Shutter {
//!     fn points(&self) -> PointCursor<PointArgs> {
//!         Box::new([false, true].into_iter().map(|open| vec![json!(open)]))
//!     }
//!     fn point_amount(&self) -> usize { 2 }
//!     async fn configure(&self, args: PointArgs) -> Result<Fields> {
//!         let open = args.first().and_then(Value::as_bool).unwrap_or(false);
//!         *self.open.write() = open;
//!         Ok(json!({ "open": open }).as_object().cloned().unwrap_or_default())
//!     }
//! }
//! ```

use crate::data::Fields;
use crate::sweep::PointCursor;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// Argument tuple handed to [`Configurable::configure`] for one step.
pub type PointArgs = Vec<Value>;

/// Lifecycle and configuration shared by every device.
///
/// # Contract
/// - `initialize` runs once before the first run of a sequence, `finalize` once
///   after the last, whatever the outcome
/// - `get_config` returns a JSON snapshot that `set_config` accepts unchanged
#[async_trait]
pub trait Instrument: Send + Sync {
    /// Prepare the device for a sequence.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Release the device after a sequence.
    async fn finalize(&self) -> Result<()> {
        Ok(())
    }

    /// Snapshot of the current configuration.
    async fn get_config(&self) -> Result<Value>;

    /// Restore a snapshot produced by [`get_config`](Instrument::get_config).
    async fn set_config(&self, config: Value) -> Result<()>;

    /// Human readable description of each result field.
    fn variable_documentation(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Capability: Parameter Stepping
///
/// Devices that are set to a new point at every sweep step (stages, sources,
/// polarisation optics).
///
/// # Contract
/// - `points` returns a fresh cursor over the current configuration; calling it
///   again restarts the sequence
/// - `point_amount` equals the number of items one cursor yields
/// - `configure` applies one point and reports what was set
#[async_trait]
pub trait Configurable: Instrument {
    /// Fresh cursor over the points of the current configuration.
    fn points(&self) -> PointCursor<PointArgs>;

    /// Number of points one cursor yields.
    fn point_amount(&self) -> usize;

    /// Apply one point.
    async fn configure(&self, args: PointArgs) -> Result<Fields>;
}

/// Capability: Measurement
///
/// Devices read once per sweep step after every configurable has been set.
#[async_trait]
pub trait Observable: Instrument {
    /// Record one measurement.
    async fn observe(&self) -> Result<Fields>;
}
