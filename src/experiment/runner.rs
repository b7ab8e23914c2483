//! Executes one sweep.
//!
//! The runner turns every registered configurable into a schedule entry whose
//! consumer defers a `configure` call through the [`Dispatcher`]. Each step of
//! [`ExperimentRunner::run_sweep`] then:
//!
//! 1. advances the schedule, which queues one configure call per level that moved
//! 2. appends a row tagged with the current run id
//! 3. drains the configure phase
//! 4. queues and drains one `observe` call per observable
//! 5. records the step timestamps and notifies the caller
//!
//! Failures are captured, not returned: the sweep ends, the state becomes
//! [`RunnerState::Errored`] and the error stays available through
//! [`ExperimentRunner::error`]. Rows written before the failure are kept.

use super::component::{verify_names, ComponentSpec, InstrumentPoints, ObservableSpec};
use super::state::RunnerState;
use crate::data::repository::{DataRepository, Timestamps};
use crate::dispatcher::{default_workers, Dispatcher};
use crate::error::{AppResult, SweepError};
use crate::hardware::capabilities::PointArgs;
use crate::sweep::{ScheduleEntry, SweepSchedule};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Runner tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Concurrency bound of each dispatch phase.
    pub max_workers: usize,
    /// Pause after every step.
    pub step_delay: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_workers(),
            step_delay: None,
        }
    }
}

/// Progress notification sent after every completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// Run id the step's row is tagged with.
    pub run_id: u64,
    /// Steps completed so far in this sweep, starting at 1.
    pub step: usize,
    /// Total steps of the sweep.
    pub point_count: usize,
}

/// Drives a [`SweepSchedule`] over the registered components.
pub struct ExperimentRunner {
    configurables: Vec<ComponentSpec>,
    observables: Vec<ObservableSpec>,
    repository: Arc<DataRepository>,
    dispatcher: Dispatcher<()>,
    schedule: Option<SweepSchedule<PointArgs>>,
    state: RunnerState,
    error: Option<SweepError>,
    completed: bool,
    stop: Arc<AtomicBool>,
    step_delay: Option<Duration>,
}

impl ExperimentRunner {
    /// Register components writing into `repository`.
    ///
    /// Fails on duplicate or reserved component names.
    pub fn new(
        configurables: Vec<ComponentSpec>,
        observables: Vec<ObservableSpec>,
        repository: Arc<DataRepository>,
        config: RunnerConfig,
    ) -> AppResult<Self> {
        verify_names(&configurables, &observables)?;
        Ok(Self {
            configurables,
            observables,
            repository,
            dispatcher: Dispatcher::new(config.max_workers),
            schedule: None,
            state: RunnerState::Idle,
            error: None,
            completed: false,
            stop: Arc::new(AtomicBool::new(false)),
            step_delay: config.step_delay.filter(|d| !d.is_zero()),
        })
    }

    /// Build a fresh schedule from the components' current configuration.
    ///
    /// Clears any previously captured error.
    pub fn setup_schedule(&mut self) -> AppResult<()> {
        let entries = self
            .configurables
            .iter()
            .map(|spec| self.schedule_entry(spec))
            .collect();
        let schedule = SweepSchedule::new(entries)?;
        debug!(
            point_count = schedule.point_count(),
            levels = ?schedule.levels(),
            "Sweep schedule ready"
        );

        self.dispatcher.clear();
        self.schedule = Some(schedule);
        self.error = None;
        self.completed = false;
        self.state = RunnerState::Ready;
        Ok(())
    }

    fn schedule_entry(&self, spec: &ComponentSpec) -> ScheduleEntry<PointArgs> {
        let instrument = Arc::clone(&spec.instrument);
        let repository = Arc::clone(&self.repository);
        let name = spec.name.clone();
        let deferred = self.dispatcher.wrap(move |args: PointArgs| {
            let instrument = Arc::clone(&instrument);
            let repository = Arc::clone(&repository);
            let name = name.clone();
            async move {
                let fields = instrument
                    .configure(args)
                    .await
                    .map_err(|source| SweepError::Configuration {
                        component: name.clone(),
                        source,
                    })?;
                repository.set_field(&name, fields)
            }
        });

        ScheduleEntry::new(
            spec.coupling,
            InstrumentPoints::new(Arc::clone(&spec.instrument)),
            move |args| {
                deferred(args);
                Ok(())
            },
        )
    }

    /// Steps of the prepared sweep, `None` before [`setup_schedule`](Self::setup_schedule).
    pub fn point_count(&self) -> Option<usize> {
        self.schedule.as_ref().map(SweepSchedule::point_count)
    }

    /// Execute the prepared sweep until it is exhausted, stopped or fails.
    ///
    /// `on_step` runs after each completed step. Returns the final state; a
    /// failure is available from [`error`](Self::error).
    pub async fn run_sweep<F>(&mut self, mut on_step: F) -> RunnerState
    where
        F: FnMut(&StepReport) + Send,
    {
        let Some(mut schedule) = self.schedule.take() else {
            self.capture(SweepError::NotReady);
            return self.state;
        };

        self.state = RunnerState::Running;
        self.completed = false;
        let run_id = self.repository.run_id();
        let point_count = schedule.point_count();
        info!(run_id, point_count, "Starting sweep");

        let (stop, dispatcher, observables, repository) =
            (&self.stop, &self.dispatcher, &self.observables, &self.repository);
        let step_delay = self.step_delay;
        let mut step = 0;
        let result: AppResult<()> = async {
            while !stop.load(Ordering::SeqCst) && schedule.advance()? {
                execute_step(dispatcher, observables, repository, run_id).await?;
                step += 1;
                debug!(run_id, step, point_count, "Step complete");
                on_step(&StepReport {
                    run_id,
                    step,
                    point_count,
                });
                if let Some(delay) = step_delay {
                    sleep(delay).await;
                }
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                self.state = RunnerState::Stopped;
                self.completed = step == point_count;
                info!(
                    run_id,
                    steps = step,
                    completed = self.completed,
                    "Sweep finished"
                );
            }
            Err(err) => {
                self.dispatcher.clear();
                self.capture(err);
            }
        }
        self.state
    }

    fn capture(&mut self, err: SweepError) {
        error!(
            component = err.component().unwrap_or("-"),
            error = %err,
            "Sweep aborted"
        );
        self.error = Some(err);
        self.state = RunnerState::Errored;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Whether the last sweep visited every point of its schedule.
    ///
    /// False after an error, and after a stop that left points unvisited.
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Error that ended the last sweep.
    pub fn error(&self) -> Option<&SweepError> {
        self.error.as_ref()
    }

    /// Remove and return the captured error.
    pub fn take_error(&mut self) -> Option<SweepError> {
        self.error.take()
    }

    /// Request the sweep to end after the current step. Idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Flag that stops the runner when raised from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Lower the stop flag so a new sweep can run.
    pub fn clear_stop(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }

    /// Log every step writes into.
    pub fn repository(&self) -> &Arc<DataRepository> {
        &self.repository
    }

    /// Registered configurables in registration order.
    pub fn configurables(&self) -> &[ComponentSpec] {
        &self.configurables
    }

    /// Registered observables in registration order.
    pub fn observables(&self) -> &[ObservableSpec] {
        &self.observables
    }
}

async fn execute_step(
    dispatcher: &Dispatcher<()>,
    observables: &[ObservableSpec],
    repository: &Arc<DataRepository>,
    run_id: u64,
) -> AppResult<()> {
    repository.begin_row(run_id);

    let config_start_time = Utc::now();
    dispatcher.drain_and_run().await?;

    let observe_start_time = Utc::now();
    for spec in observables {
        let instrument = Arc::clone(&spec.instrument);
        let repository = Arc::clone(repository);
        let name = spec.name.clone();
        dispatcher.submit(async move {
            let fields = instrument
                .observe()
                .await
                .map_err(|source| SweepError::Observation {
                    component: name.clone(),
                    source,
                })?;
            repository.set_field(&name, fields)
        });
    }
    dispatcher.drain_and_run().await?;

    repository.set_timestamps(Timestamps {
        config_start_time,
        observe_start_time,
        end_time: Utc::now(),
    })
}
