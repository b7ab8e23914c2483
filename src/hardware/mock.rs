//! Mock Hardware Implementations
//!
//! Provides simulated devices for running sweeps without physical hardware.
//! All mock devices use async-safe waits (tokio::time::sleep, not std::thread::sleep).
//!
//! # Available Mocks
//!
//! - `LinearAxis` - single-axis stage stepping evenly between two positions
//! - `GridMapper` - virtual 2D positioner walking an X/Y raster
//! - `RandomValue` - observable returning a uniform random reading
//!
//! Configuration lives behind `parking_lot::RwLock` because point cursors are
//! produced synchronously from the current settings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::data::{into_fields, Fields};
use crate::hardware::capabilities::{Configurable, Instrument, Observable, PointArgs};
use crate::sweep::PointCursor;

/// Evenly spaced value `idx` of `amount` between `start` and `stop`.
fn interpolate(start: f64, stop: f64, amount: usize, idx: usize) -> f64 {
    if amount <= 1 {
        start
    } else {
        start + (stop - start) / (amount - 1) as f64 * idx as f64
    }
}

// =============================================================================
// LinearAxis - Simulated Motion Stage
// =============================================================================

/// Settings of a [`LinearAxis`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// First position.
    pub start: f64,
    /// Last position.
    pub stop: f64,
    /// Number of positions, endpoints included.
    pub points: usize,
    /// Simulated settling time after every move.
    #[serde(default)]
    pub settle_ms: u64,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 1.0,
            points: 2,
            settle_ms: 0,
        }
    }
}

impl AxisConfig {
    /// Position of point `idx`.
    pub fn position_at(&self, idx: usize) -> f64 {
        interpolate(self.start, self.stop, self.points, idx)
    }
}

/// Mock stage moving to each configured position in turn.
///
/// # Example
///
/// ```rust,ignore
/// let axis = LinearAxis::new(AxisConfig { start: 0.0, stop: 10.0, points: 11, settle_ms: 0 });
/// axis.configure(vec![json!(5.0)]).await?;
/// assert_eq!(axis.position(), 5.0);
/// ```
#[derive(Debug, Default)]
pub struct LinearAxis {
    config: RwLock<AxisConfig>,
    position: RwLock<f64>,
}

impl LinearAxis {
    /// Create an axis resting at `config.start`.
    pub fn new(config: AxisConfig) -> Self {
        let start = config.start;
        Self {
            config: RwLock::new(config),
            position: RwLock::new(start),
        }
    }

    /// Last position moved to.
    pub fn position(&self) -> f64 {
        *self.position.read()
    }
}

#[async_trait]
impl Instrument for LinearAxis {
    async fn get_config(&self) -> Result<Value> {
        Ok(serde_json::to_value(&*self.config.read())?)
    }

    async fn set_config(&self, config: Value) -> Result<()> {
        let parsed: AxisConfig =
            serde_json::from_value(config).context("Invalid linear axis configuration")?;
        *self.config.write() = parsed;
        Ok(())
    }

    fn variable_documentation(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            "position".to_string(),
            "Position the axis was moved to for this step.".to_string(),
        )])
    }
}

#[async_trait]
impl Configurable for LinearAxis {
    fn points(&self) -> PointCursor<PointArgs> {
        let config = self.config.read().clone();
        Box::new((0..config.points).map(move |i| vec![json!(config.position_at(i))]))
    }

    fn point_amount(&self) -> usize {
        self.config.read().points
    }

    async fn configure(&self, args: PointArgs) -> Result<Fields> {
        let target = args
            .first()
            .and_then(Value::as_f64)
            .context("LinearAxis expects a numeric position")?;
        let settle_ms = self.config.read().settle_ms;
        if settle_ms > 0 {
            sleep(Duration::from_millis(settle_ms)).await;
        }
        *self.position.write() = target;
        debug!(position = target, "LinearAxis moved");
        Ok(into_fields(json!({ "position": target })))
    }
}

// =============================================================================
// GridMapper - Virtual 2D Positioner
// =============================================================================

/// One axis of a [`GridMapper`] raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    /// Number of positions.
    pub amount: usize,
    /// First position.
    pub init: f64,
    /// Last position.
    #[serde(rename = "final")]
    pub end: f64,
}

impl GridAxis {
    fn position_at(&self, idx: usize) -> f64 {
        interpolate(self.init, self.end, self.amount, idx)
    }
}

/// Settings of a [`GridMapper`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Outer (slow) axis.
    pub x: GridAxis,
    /// Inner (fast) axis.
    pub y: GridAxis,
    /// Simulated move time per point.
    #[serde(default)]
    pub move_ms: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        let axis = GridAxis {
            amount: 2,
            init: 0.0,
            end: 1.0,
        };
        Self {
            x: axis.clone(),
            y: axis,
            move_ms: 0,
        }
    }
}

/// Virtual positioner producing a full X/Y raster from a single device.
///
/// The whole raster belongs to one coupling level; Y varies fastest.
#[derive(Debug, Default)]
pub struct GridMapper {
    config: RwLock<GridConfig>,
}

impl GridMapper {
    /// Create a mapper with the given raster.
    pub fn new(config: GridConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }
}

#[async_trait]
impl Instrument for GridMapper {
    async fn get_config(&self) -> Result<Value> {
        Ok(serde_json::to_value(&*self.config.read())?)
    }

    async fn set_config(&self, config: Value) -> Result<()> {
        let parsed: GridConfig =
            serde_json::from_value(config).context("Invalid grid mapper configuration")?;
        *self.config.write() = parsed;
        Ok(())
    }

    fn variable_documentation(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                "x".to_string(),
                "The X coordinate of the positioner. It's a virtual variable.".to_string(),
            ),
            (
                "y".to_string(),
                "The Y coordinate of the positioner. It's a virtual variable.".to_string(),
            ),
        ])
    }
}

#[async_trait]
impl Configurable for GridMapper {
    fn points(&self) -> PointCursor<PointArgs> {
        let config = self.config.read().clone();
        let (nx, ny) = (config.x.amount, config.y.amount);
        Box::new((0..nx).flat_map(move |ix| {
            let config = config.clone();
            (0..ny).map(move |iy| {
                vec![
                    json!(config.x.position_at(ix)),
                    json!(config.y.position_at(iy)),
                ]
            })
        }))
    }

    fn point_amount(&self) -> usize {
        let config = self.config.read();
        config.x.amount * config.y.amount
    }

    async fn configure(&self, args: PointArgs) -> Result<Fields> {
        let coord = |idx: usize| {
            args.get(idx)
                .and_then(Value::as_f64)
                .context("GridMapper expects numeric (x, y) arguments")
        };
        let (x, y) = (coord(0)?, coord(1)?);
        let move_ms = self.config.read().move_ms;
        if move_ms > 0 {
            sleep(Duration::from_millis(move_ms)).await;
        }
        Ok(into_fields(json!({ "x": x, "y": y })))
    }
}

// =============================================================================
// RandomValue - Simulated Detector
// =============================================================================

/// Settings of a [`RandomValue`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomConfig {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// Detector returning a uniform random reading in `[min, max)`.
#[derive(Debug, Default)]
pub struct RandomValue {
    config: RwLock<RandomConfig>,
}

impl RandomValue {
    /// Create a detector with the given range.
    pub fn new(config: RandomConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }
}

#[async_trait]
impl Instrument for RandomValue {
    async fn get_config(&self) -> Result<Value> {
        Ok(serde_json::to_value(&*self.config.read())?)
    }

    async fn set_config(&self, config: Value) -> Result<()> {
        let parsed: RandomConfig =
            serde_json::from_value(config).context("Invalid random value configuration")?;
        if parsed.max < parsed.min {
            anyhow::bail!("max ({}) must not be below min ({})", parsed.max, parsed.min);
        }
        *self.config.write() = parsed;
        Ok(())
    }

    fn variable_documentation(&self) -> BTreeMap<String, String> {
        let config = self.config.read();
        BTreeMap::from([(
            "val".to_string(),
            format!(
                "This represents a random value in the {}-{} range",
                config.min, config.max
            ),
        )])
    }
}

#[async_trait]
impl Observable for RandomValue {
    async fn observe(&self) -> Result<Fields> {
        let RandomConfig { min, max } = self.config.read().clone();
        let val = min + rand::thread_rng().gen::<f64>() * (max - min);
        Ok(into_fields(json!({ "val": val })))
    }
}
