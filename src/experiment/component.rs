//! Component registration.
//!
//! A component is an instrument registered under a unique name. Configurables
//! also carry the coupling level that places them in the sweep odometer.

use crate::data::repository::is_reserved;
use crate::error::{AppResult, LifecyclePhase, SweepError};
use crate::hardware::capabilities::{Configurable, Observable, PointArgs};
use crate::sweep::{PointCursor, PointSource};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A configurable instrument registered for a sweep.
#[derive(Clone)]
pub struct ComponentSpec {
    /// Unique name; also the key of its results in every data row.
    pub name: String,
    /// Coupling level. Higher levels vary faster.
    pub coupling: i32,
    /// The device.
    pub instrument: Arc<dyn Configurable>,
}

impl ComponentSpec {
    /// Register `instrument` under `name` at `coupling`.
    pub fn new(name: impl Into<String>, coupling: i32, instrument: Arc<dyn Configurable>) -> Self {
        Self {
            name: name.into(),
            coupling,
            instrument,
        }
    }
}

impl fmt::Debug for ComponentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentSpec")
            .field("name", &self.name)
            .field("coupling", &self.coupling)
            .finish_non_exhaustive()
    }
}

/// An observable instrument registered for a sweep.
#[derive(Clone)]
pub struct ObservableSpec {
    /// Unique name; also the key of its results in every data row.
    pub name: String,
    /// The device.
    pub instrument: Arc<dyn Observable>,
}

impl ObservableSpec {
    /// Register `instrument` under `name`.
    pub fn new(name: impl Into<String>, instrument: Arc<dyn Observable>) -> Self {
        Self {
            name: name.into(),
            instrument,
        }
    }
}

impl fmt::Debug for ObservableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableSpec")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Reject reserved names and names used twice across both collections.
pub fn verify_names(configurables: &[ComponentSpec], observables: &[ObservableSpec]) -> AppResult<()> {
    let mut seen = HashSet::new();
    let names = configurables
        .iter()
        .map(|c| c.name.as_str())
        .chain(observables.iter().map(|o| o.name.as_str()));
    for name in names {
        if is_reserved(name) {
            return Err(SweepError::ReservedName(name.to_string()));
        }
        if !seen.insert(name) {
            return Err(SweepError::DuplicateName(name.to_string()));
        }
    }
    Ok(())
}

/// Exposes a configurable's points to the sweep schedule.
pub struct InstrumentPoints(Arc<dyn Configurable>);

impl InstrumentPoints {
    /// Wrap a configurable.
    pub fn new(instrument: Arc<dyn Configurable>) -> Self {
        Self(instrument)
    }
}

impl PointSource<PointArgs> for InstrumentPoints {
    fn cursor(&self) -> PointCursor<PointArgs> {
        self.0.points()
    }

    fn len(&self) -> usize {
        self.0.point_amount()
    }
}

/// Any registered instrument, for lifecycle and snapshot handling.
#[derive(Clone)]
pub enum ManagedComponent {
    /// Stepped at every sweep point.
    Configurable(Arc<dyn Configurable>),
    /// Read at every sweep point.
    Observable(Arc<dyn Observable>),
}

impl ManagedComponent {
    /// "Configurable" or "Observable".
    pub fn kind(&self) -> &'static str {
        match self {
            ManagedComponent::Configurable(_) => "Configurable",
            ManagedComponent::Observable(_) => "Observable",
        }
    }

    /// Run the device's `initialize` hook; failures are tagged with `name`.
    pub async fn initialize(&self, name: &str) -> AppResult<()> {
        let result = match self {
            ManagedComponent::Configurable(c) => c.initialize().await,
            ManagedComponent::Observable(o) => o.initialize().await,
        };
        result.map_err(|source| lifecycle(name, LifecyclePhase::Initialize, source))
    }

    /// Run the device's `finalize` hook.
    pub async fn finalize(&self, name: &str) -> AppResult<()> {
        let result = match self {
            ManagedComponent::Configurable(c) => c.finalize().await,
            ManagedComponent::Observable(o) => o.finalize().await,
        };
        result.map_err(|source| lifecycle(name, LifecyclePhase::Finalize, source))
    }

    /// Capture the device's configuration snapshot.
    pub async fn get_config(&self, name: &str) -> AppResult<Value> {
        let result = match self {
            ManagedComponent::Configurable(c) => c.get_config().await,
            ManagedComponent::Observable(o) => o.get_config().await,
        };
        result.map_err(|source| lifecycle(name, LifecyclePhase::CaptureConfig, source))
    }

    /// Restore a configuration snapshot.
    pub async fn set_config(&self, name: &str, config: Value) -> AppResult<()> {
        let result = match self {
            ManagedComponent::Configurable(c) => c.set_config(config).await,
            ManagedComponent::Observable(o) => o.set_config(config).await,
        };
        result.map_err(|source| lifecycle(name, LifecyclePhase::ApplyConfig, source))
    }

    /// Description of each result field.
    pub fn variable_documentation(&self) -> BTreeMap<String, String> {
        match self {
            ManagedComponent::Configurable(c) => c.variable_documentation(),
            ManagedComponent::Observable(o) => o.variable_documentation(),
        }
    }
}

impl fmt::Debug for ManagedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

fn lifecycle(name: &str, phase: LifecyclePhase, source: anyhow::Error) -> SweepError {
    SweepError::Lifecycle {
        component: name.to_string(),
        phase,
        source,
    }
}

/// Every registered component in registration order, configurables first.
pub fn managed_components(
    configurables: &[ComponentSpec],
    observables: &[ObservableSpec],
) -> Vec<(String, ManagedComponent)> {
    configurables
        .iter()
        .map(|c| {
            (
                c.name.clone(),
                ManagedComponent::Configurable(Arc::clone(&c.instrument)),
            )
        })
        .chain(observables.iter().map(|o| {
            (
                o.name.clone(),
                ManagedComponent::Observable(Arc::clone(&o.instrument)),
            )
        }))
        .collect()
}
