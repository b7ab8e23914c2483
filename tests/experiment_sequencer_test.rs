//! Integration tests for the experiment runner and sequencer
//!
//! These use scripted instruments that count their lifecycle calls and fail on
//! demand, and check error containment, cooperative stop and run bookkeeping.

mod common;

use common::{CountingMeter, Lifecycle, ScriptedAxis};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use sweep_daq::data::table::flatten;
use sweep_daq::data::DataRepository;
use sweep_daq::error::LifecyclePhase;
use sweep_daq::experiment::{
    ComponentSpec, ExperimentRunner, ExperimentSequencer, ObservableSpec, RunnerConfig,
    RunnerState, SequenceState,
};
use sweep_daq::session;
use sweep_daq::SweepError;

fn sequencer(axis: &Arc<ScriptedAxis>, meter: &Arc<CountingMeter>) -> ExperimentSequencer {
    ExperimentSequencer::new(
        vec![ComponentSpec::new("axis", 0, axis.clone())],
        vec![ObservableSpec::new("meter", meter.clone())],
        RunnerConfig::default(),
    )
    .unwrap()
}

async fn with_runs(sequencer: &mut ExperimentSequencer, runs: usize) {
    for _ in 0..runs {
        sequencer.add_run().await.unwrap();
    }
}

// =============================================================================
// Runner
// =============================================================================

#[tokio::test]
async fn test_configure_failure_is_captured_once() {
    let axis = Arc::new(ScriptedAxis::failing_on(vec![1.0, 2.0, 3.0, 4.0, 5.0], 3));
    let meter = Arc::new(CountingMeter::new());
    let repository = Arc::new(DataRepository::new());
    let mut runner = ExperimentRunner::new(
        vec![ComponentSpec::new("axis", 0, axis.clone())],
        vec![ObservableSpec::new("meter", meter.clone())],
        repository.clone(),
        RunnerConfig::default(),
    )
    .unwrap();

    runner.setup_schedule().unwrap();
    let state = runner.run_sweep(|_| {}).await;

    assert_eq!(state, RunnerState::Errored);
    match runner.error() {
        Some(SweepError::Configuration { component, source }) => {
            assert_eq!(component, "axis");
            assert!(source.to_string().contains("motor stalled at 3"));
        }
        other => panic!("expected configuration error, got {other:?}"),
    }

    // The failing step's row exists, nothing after it.
    assert_eq!(repository.len(), 3);
    assert_eq!(axis.calls(), vec![1.0, 2.0, 3.0]);
    assert_eq!(meter.reads(), 2);
    let last = repository.last_row().unwrap();
    assert!(last.get("axis").is_none());
    assert!(last.timestamp.is_none());
}

#[tokio::test]
async fn test_simultaneous_failures_are_aggregated() {
    let first = Arc::new(ScriptedAxis::failing_on(vec![1.0, 2.0], 1));
    let second = Arc::new(ScriptedAxis::failing_on(vec![3.0, 4.0], 1));
    let mut runner = ExperimentRunner::new(
        vec![
            ComponentSpec::new("first", 0, first),
            ComponentSpec::new("second", 0, second),
        ],
        vec![],
        Arc::new(DataRepository::new()),
        RunnerConfig::default(),
    )
    .unwrap();

    runner.setup_schedule().unwrap();
    runner.run_sweep(|_| {}).await;

    match runner.take_error() {
        Some(SweepError::Multiple(errors)) => {
            assert_eq!(errors.len(), 2);
            assert_eq!(errors[0].component(), Some("first"));
            assert_eq!(errors[1].component(), Some("second"));
        }
        other => panic!("expected aggregate error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_observation_failure_keeps_partial_row() {
    let axis = Arc::new(ScriptedAxis::new(vec![1.0, 2.0, 3.0]));
    let meter = Arc::new(CountingMeter {
        fail_on_read: Some(2),
        ..Default::default()
    });
    let mut sequencer = sequencer(&axis, &meter);
    with_runs(&mut sequencer, 1).await;

    let outcome = sequencer.start_sequence(|_, _| {}, |_| {}).await;
    assert_eq!(outcome.state, SequenceState::Errored);
    assert!(matches!(
        outcome.error,
        Some(SweepError::Observation { ref component, .. }) if component == "meter"
    ));

    let rows = sequencer.repository().rows();
    assert_eq!(rows.len(), 2);
    assert!(rows[1].get("axis").is_some());
    assert!(rows[1].get("meter").is_none());

    let table = flatten(&rows);
    assert_eq!(table.column("axis_value").unwrap().len(), 2);
    let reads = table.column("meter_reads").unwrap();
    assert_eq!(reads[0], reads[1]);
}

// =============================================================================
// Sequencer
// =============================================================================

#[tokio::test]
async fn test_run_ids_increment_per_run() {
    let axis = Arc::new(ScriptedAxis::new(vec![1.0, 2.0]));
    let meter = Arc::new(CountingMeter::new());
    let mut sequencer = sequencer(&axis, &meter);
    with_runs(&mut sequencer, 3).await;

    let mut run_starts = Vec::new();
    let outcome = sequencer
        .start_sequence(|index, run| run_starts.push((index, run.len())), |_| {})
        .await;

    assert_eq!(outcome.state, SequenceState::Finished);
    assert_eq!(outcome.runs_completed, 3);
    assert_eq!(run_starts, vec![(0, 2), (1, 2), (2, 2)]);

    let repository = sequencer.repository();
    assert_eq!(repository.run_id(), 3);
    for run in 0..3 {
        assert_eq!(repository.rows_for_run(run).len(), 2);
    }
    let ids: Vec<u64> = repository.rows().iter().map(|row| row.run.id).collect();
    assert_eq!(ids, vec![0, 0, 1, 1, 2, 2]);
}

#[tokio::test]
async fn test_stop_mid_run_finalizes_once() {
    let axis = Arc::new(ScriptedAxis::new(vec![1.0, 2.0, 3.0]));
    let meter = Arc::new(CountingMeter::new());
    let mut sequencer = sequencer(&axis, &meter);
    with_runs(&mut sequencer, 2).await;

    let stop = sequencer.stop_handle();
    let outcome = sequencer
        .start_sequence(
            |_, _| {},
            |report| {
                if report.step == 2 {
                    stop.store(true, Ordering::SeqCst);
                }
            },
        )
        .await;

    assert_eq!(outcome.state, SequenceState::StoppedEarly);
    assert!(outcome.is_ok());

    // The step in flight completed, no further step or run started.
    let repository = sequencer.repository();
    assert_eq!(repository.len(), 2);
    assert!(repository.last_row().unwrap().timestamp.is_some());
    assert!(repository.rows_for_run(1).is_empty());
    assert_eq!(axis.calls().len(), 2);

    assert_eq!(axis.lifecycle.initialized(), 1);
    assert_eq!(axis.lifecycle.finalized(), 1);
    assert_eq!(meter.lifecycle.initialized(), 1);
    assert_eq!(meter.lifecycle.finalized(), 1);
}

#[tokio::test]
async fn test_stop_on_final_step_reports_finished() {
    let axis = Arc::new(ScriptedAxis::new(vec![1.0, 2.0]));
    let meter = Arc::new(CountingMeter::new());
    let mut sequencer = sequencer(&axis, &meter);
    with_runs(&mut sequencer, 2).await;

    let stop = sequencer.stop_handle();
    let outcome = sequencer
        .start_sequence(
            |_, _| {},
            |report| {
                if report.run_id == 1 && report.step == report.point_count {
                    stop.store(true, Ordering::SeqCst);
                }
            },
        )
        .await;

    assert_eq!(outcome.state, SequenceState::Finished);
    assert_eq!(outcome.runs_completed, 2);
    assert_eq!(sequencer.repository().len(), 4);
}

#[tokio::test]
async fn test_stop_on_final_step_of_earlier_run_stops_early() {
    let axis = Arc::new(ScriptedAxis::new(vec![1.0, 2.0]));
    let meter = Arc::new(CountingMeter::new());
    let mut sequencer = sequencer(&axis, &meter);
    with_runs(&mut sequencer, 2).await;

    let stop = sequencer.stop_handle();
    let outcome = sequencer
        .start_sequence(
            |_, _| {},
            |report| {
                if report.step == report.point_count {
                    stop.store(true, Ordering::SeqCst);
                }
            },
        )
        .await;

    assert_eq!(outcome.state, SequenceState::StoppedEarly);
    assert_eq!(outcome.runs_completed, 1);
    assert!(sequencer.repository().rows_for_run(1).is_empty());
}

#[tokio::test]
async fn test_stop_before_sweep_leaves_run_uncounted() {
    let axis = Arc::new(ScriptedAxis::new(vec![1.0, 2.0]));
    let meter = Arc::new(CountingMeter::new());
    let mut sequencer = sequencer(&axis, &meter);
    with_runs(&mut sequencer, 1).await;

    let stop = sequencer.stop_handle();
    let outcome = sequencer
        .start_sequence(|_, _| stop.store(true, Ordering::SeqCst), |_| {})
        .await;

    assert_eq!(outcome.state, SequenceState::StoppedEarly);
    assert_eq!(outcome.runs_completed, 0);
    let repository = sequencer.repository();
    assert!(repository.is_empty());
    assert_eq!(repository.run_id(), 0);
    assert!(axis.calls().is_empty());
    assert_eq!(axis.lifecycle.finalized(), 1);
}

#[tokio::test]
async fn test_error_aborts_remaining_runs() {
    // Two points per run; the first call of the second run fails.
    let axis = Arc::new(ScriptedAxis::failing_on(vec![1.0, 2.0], 3));
    let meter = Arc::new(CountingMeter::new());
    let mut sequencer = sequencer(&axis, &meter);
    with_runs(&mut sequencer, 3).await;

    let outcome = sequencer.start_sequence(|_, _| {}, |_| {}).await;

    assert_eq!(outcome.state, SequenceState::Errored);
    assert_eq!(outcome.runs_completed, 1);
    assert_eq!(outcome.error.as_ref().and_then(SweepError::component), Some("axis"));

    let repository = sequencer.repository();
    assert_eq!(repository.rows_for_run(0).len(), 2);
    assert_eq!(repository.rows_for_run(1).len(), 1);
    assert!(repository.rows_for_run(2).is_empty());
    assert_eq!(repository.run_id(), 1);
    assert_eq!(axis.lifecycle.finalized(), 1);
    assert_eq!(meter.lifecycle.finalized(), 1);
}

#[tokio::test]
async fn test_initialize_failure_skips_runs_but_finalizes_initialized() {
    let axis = Arc::new(ScriptedAxis::new(vec![1.0]));
    let meter = Arc::new(CountingMeter {
        lifecycle: Lifecycle {
            fail_initialize: true,
            ..Default::default()
        },
        ..Default::default()
    });
    let mut sequencer = sequencer(&axis, &meter);
    with_runs(&mut sequencer, 1).await;

    let outcome = sequencer.start_sequence(|_, _| {}, |_| {}).await;

    assert_eq!(outcome.state, SequenceState::Errored);
    assert!(matches!(
        outcome.error,
        Some(SweepError::Lifecycle {
            phase: LifecyclePhase::Initialize,
            ref component,
            ..
        }) if component == "meter"
    ));
    assert!(sequencer.repository().is_empty());
    assert_eq!(axis.lifecycle.finalized(), 1);
    assert_eq!(meter.lifecycle.finalized(), 0);
}

#[tokio::test]
async fn test_finalize_failure_is_reported() {
    let axis = Arc::new(ScriptedAxis {
        lifecycle: Lifecycle {
            fail_finalize: true,
            ..Default::default()
        },
        ..ScriptedAxis::new(vec![1.0, 2.0])
    });
    let meter = Arc::new(CountingMeter::new());
    let mut sequencer = sequencer(&axis, &meter);
    with_runs(&mut sequencer, 1).await;

    let outcome = sequencer.start_sequence(|_, _| {}, |_| {}).await;

    assert_eq!(outcome.state, SequenceState::Errored);
    assert_eq!(outcome.runs_completed, 1);
    assert!(matches!(
        outcome.error,
        Some(SweepError::Lifecycle {
            phase: LifecyclePhase::Finalize,
            ..
        })
    ));
    assert_eq!(meter.lifecycle.finalized(), 1);
}

#[tokio::test]
async fn test_saved_sequence_replays_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sequence.json");

    let axis = Arc::new(ScriptedAxis::new(vec![1.0, 2.0]));
    let meter = Arc::new(CountingMeter::new());
    let mut recorder = sequencer(&axis, &meter);
    recorder.add_run().await.unwrap();
    *axis.values.lock() = vec![5.0, 6.0, 7.0];
    recorder.add_run().await.unwrap();
    session::save_sequence(&path, recorder.sequence()).unwrap();

    let replay_axis = Arc::new(ScriptedAxis::new(vec![0.0]));
    let mut replay = sequencer(&replay_axis, &Arc::new(CountingMeter::new()));
    replay.load_sequence(session::load_sequence(&path).unwrap());

    let outcome = replay.start_sequence(|_, _| {}, |_| {}).await;
    assert_eq!(outcome.state, SequenceState::Finished);
    assert_eq!(replay_axis.calls(), vec![1.0, 2.0, 5.0, 6.0, 7.0]);
}
