//! CLI Entry Point for sweep-daq
//!
//! Runs a demo experiment on simulated devices:
//! - `grid` (coupling 0): a virtual X/Y positioner
//! - `axis` (coupling 1): a linear stage, stepped fastest
//! - `meter`: a random-valued detector read at every step
//!
//! # Usage
//!
//! ```bash
//! sweep-daq run --runs 2 --json
//! sweep-daq run --sequence saved.json
//! sweep-daq points --config config/sweep.toml
//! sweep-daq docs
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use sweep_daq::config::{SweepConfig, DEFAULT_CONFIG_PATH};
use sweep_daq::data::table::flatten;
use sweep_daq::experiment::documentation::markdown;
use sweep_daq::experiment::{
    ComponentSpec, ExperimentSequencer, ObservableSpec, ProgressTracker, SequenceState,
};
use sweep_daq::hardware::mock::{GridMapper, LinearAxis, RandomValue};
use sweep_daq::{logging, session};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sweep-daq")]
#[command(about = "Multi-axis parameter sweeps over simulated instruments", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a sequence of sweeps and print the recorded rows
    Run {
        /// Number of identical runs when no sequence file is given
        #[arg(long, default_value = "1")]
        runs: usize,

        /// Replay a sequence saved with --save
        #[arg(long)]
        sequence: Option<PathBuf>,

        /// Write the executed sequence to this file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Print rows as JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the number of steps in one sweep
    Points,

    /// Print markdown documentation of the recorded values
    Docs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SweepConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    config.validate()?;
    logging::init_from_config(&config)?;
    info!(application = %config.application.name, "Configuration loaded");

    match cli.command {
        Commands::Run {
            runs,
            sequence,
            save,
            json,
        } => run_sequence(&config, runs, sequence.as_deref(), save.as_deref(), json).await,
        Commands::Points => {
            let mut sequencer = demo_sequencer(&config)?;
            println!("{}", sequencer.point_count()?);
            Ok(())
        }
        Commands::Docs => {
            let sequencer = demo_sequencer(&config)?;
            print!("{}", markdown(sequencer.components()));
            Ok(())
        }
    }
}

fn demo_sequencer(config: &SweepConfig) -> Result<ExperimentSequencer> {
    let demo = &config.demo;
    let sequencer = ExperimentSequencer::new(
        vec![
            ComponentSpec::new("grid", 0, Arc::new(GridMapper::new(demo.grid.clone()))),
            ComponentSpec::new("axis", 1, Arc::new(LinearAxis::new(demo.axis.clone()))),
        ],
        vec![ObservableSpec::new(
            "meter",
            Arc::new(RandomValue::new(demo.meter.clone())),
        )],
        config.runner_config(),
    )?;
    Ok(sequencer)
}

async fn run_sequence(
    config: &SweepConfig,
    runs: usize,
    sequence_path: Option<&Path>,
    save_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let mut sequencer = demo_sequencer(config)?;
    match sequence_path {
        Some(path) => sequencer.load_sequence(session::load_sequence(path)?),
        None => {
            for _ in 0..runs {
                sequencer.add_run().await?;
            }
        }
    }
    if let Some(path) = save_path {
        session::save_sequence(path, sequencer.sequence())?;
    }

    let stop = sequencer.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let mut progress = ProgressTracker::new();
    let outcome = sequencer
        .start_sequence(
            |index, _| info!(run = index, "Run starting"),
            |report| {
                if report.step == 1 {
                    progress.start(report.point_count);
                }
                progress.advance(1);
                info!(
                    run_id = report.run_id,
                    progress = %progress.label(),
                    remaining = ?progress.remaining(),
                    "Step recorded"
                );
            },
        )
        .await;

    let rows = sequencer.repository().rows();
    if json {
        for row in &rows {
            println!("{}", row.to_json());
        }
    } else {
        let table = flatten(&rows);
        println!("{}", table.columns.join("\t"));
        for row in &table.rows {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            println!("{}", cells.join("\t"));
        }
    }

    info!(
        state = %outcome.state,
        runs_completed = outcome.runs_completed,
        rows = rows.len(),
        "Sequence finished"
    );
    match outcome.error {
        Some(err) => Err(err.into()),
        None if outcome.state == SequenceState::StoppedEarly => {
            warn!("Sequence was stopped before completion");
            Ok(())
        }
        None => Ok(()),
    }
}
