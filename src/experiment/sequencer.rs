//! Multi-run orchestration.
//!
//! A [`Run`] is a snapshot of every component's configuration. The sequencer
//! replays a list of runs: before each sweep it restores the snapshot, rebuilds
//! the runner's schedule and executes it. All instruments are initialized once
//! before the first run and finalized once after the last, whatever happened
//! in between.
//!
//! # State Machine
//!
//! ```text
//! Idle ──start_sequence──> Run 0 ──> Run 1 ──> ... ──> Finished
//!                            │         │
//!                            └─────────┴──> Errored | StoppedEarly
//! ```

use super::component::{managed_components, ComponentSpec, ManagedComponent, ObservableSpec};
use super::runner::{ExperimentRunner, RunnerConfig, StepReport};
use super::state::{SequenceOutcome, SequenceState};
use crate::data::repository::DataRepository;
use crate::error::{AppResult, SweepError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Configuration snapshot of every component, keyed by component name.
pub type Run = BTreeMap<String, Value>;

/// Ordered list of runs.
pub type Sequence = Vec<Run>;

/// Runs a [`Sequence`] of sweeps over one set of components.
///
/// # Example
///
/// ```rust,ignore
/// let mut sequencer = ExperimentSequencer::new(configurables, observables, RunnerConfig::default())?;
/// sequencer.add_run().await?;
/// let outcome = sequencer.start_sequence(|_, _| {}, |_| {}).await;
/// println!("{} after {} runs", outcome.state, outcome.runs_completed);
/// ```
pub struct ExperimentSequencer {
    runner: ExperimentRunner,
    components: Vec<(String, ManagedComponent)>,
    sequence: Sequence,
    stop: Arc<AtomicBool>,
}

impl ExperimentSequencer {
    /// Register components with a fresh data repository.
    pub fn new(
        configurables: Vec<ComponentSpec>,
        observables: Vec<ObservableSpec>,
        config: RunnerConfig,
    ) -> AppResult<Self> {
        Self::with_repository(
            configurables,
            observables,
            Arc::new(DataRepository::new()),
            config,
        )
    }

    /// Register components writing into an existing repository.
    pub fn with_repository(
        configurables: Vec<ComponentSpec>,
        observables: Vec<ObservableSpec>,
        repository: Arc<DataRepository>,
        config: RunnerConfig,
    ) -> AppResult<Self> {
        let components = managed_components(&configurables, &observables);
        let runner = ExperimentRunner::new(configurables, observables, repository, config)?;
        let stop = runner.stop_handle();
        Ok(Self {
            runner,
            components,
            sequence: Vec::new(),
            stop,
        })
    }

    /// Shared log every run writes into.
    pub fn repository(&self) -> Arc<DataRepository> {
        Arc::clone(self.runner.repository())
    }

    /// Registered components, configurables first.
    pub fn components(&self) -> &[(String, ManagedComponent)] {
        &self.components
    }

    /// Steps of one sweep under the components' current configuration.
    pub fn point_count(&mut self) -> AppResult<usize> {
        self.runner.setup_schedule()?;
        Ok(self.runner.point_count().unwrap_or(0))
    }

    /// Capture every component's current configuration as a new run.
    pub async fn add_run(&mut self) -> AppResult<Run> {
        let mut run = Run::new();
        for (name, component) in &self.components {
            run.insert(name.clone(), component.get_config(name).await?);
        }
        info!(runs = self.sequence.len() + 1, "Added run to sequence");
        self.sequence.push(run.clone());
        Ok(run)
    }

    /// Replace the pending sequence.
    pub fn load_sequence(&mut self, sequence: Sequence) {
        self.sequence = sequence;
    }

    /// Pending runs in execution order.
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// Drop every pending run.
    pub fn clear_sequence(&mut self) {
        self.sequence.clear();
    }

    /// Request the sequence to end after the current step. Idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Flag that stops the sequence when raised from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Execute every run of the pending sequence in order.
    ///
    /// `on_run` receives the run index and snapshot right before its sweep
    /// starts; `on_step` is forwarded to every sweep. The sequence aborts on
    /// the first error. Instruments are finalized in every case.
    ///
    /// The outcome is [`SequenceState::StoppedEarly`] only when a stop left a
    /// run or a point unvisited.
    pub async fn start_sequence<R, S>(&mut self, mut on_run: R, mut on_step: S) -> SequenceOutcome
    where
        R: FnMut(usize, &Run) + Send,
        S: FnMut(&StepReport) + Send,
    {
        self.runner.clear_stop();
        let repository = self.repository();
        info!(runs = self.sequence.len(), "Starting sequence");

        let mut initialized = 0;
        let mut failure = None;
        for (name, component) in &self.components {
            match component.initialize(name).await {
                Ok(()) => initialized += 1,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let mut runs_completed = 0;
        let mut interrupted = false;
        if failure.is_none() {
            for (index, run) in self.sequence.iter().enumerate() {
                if self.stop.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(err) = apply_run(&self.components, run).await {
                    failure = Some(err);
                    break;
                }
                if let Err(err) = self.runner.setup_schedule() {
                    failure = Some(err);
                    break;
                }

                on_run(index, run);
                if self.stop.load(Ordering::SeqCst) {
                    break;
                }
                self.runner.run_sweep(&mut on_step).await;
                if let Some(err) = self.runner.take_error() {
                    failure = Some(err);
                    break;
                }
                interrupted = !self.runner.completed();
                runs_completed += 1;
                repository.next_run();
            }
        }

        for (name, component) in self.components.iter().take(initialized) {
            if let Err(err) = component.finalize(name).await {
                warn!(component = %name, error = %err, "Finalize failed");
                failure.get_or_insert(err);
            }
        }

        let state = if failure.is_some() {
            SequenceState::Errored
        } else if interrupted || runs_completed < self.sequence.len() {
            SequenceState::StoppedEarly
        } else {
            SequenceState::Finished
        };
        match &failure {
            Some(err) => error!(runs_completed, error = %err, "Sequence aborted"),
            None => info!(runs_completed, %state, "Sequence ended"),
        }

        SequenceOutcome {
            state,
            runs_completed,
            error: failure,
        }
    }
}

/// Restore a snapshot in registration order, configurables first.
async fn apply_run(components: &[(String, ManagedComponent)], run: &Run) -> AppResult<()> {
    if let Some(unknown) = run
        .keys()
        .find(|name| !components.iter().any(|(registered, _)| registered == *name))
    {
        return Err(SweepError::UnknownComponent(unknown.clone()));
    }
    for (name, component) in components {
        if let Some(config) = run.get(name) {
            component.set_config(name, config.clone()).await?;
        }
    }
    Ok(())
}
