//! Saving and loading run sequences.
//!
//! A sequence is stored as a pretty-printed JSON array with one object per run,
//! each mapping a component name to the configuration captured by
//! [`ExperimentSequencer::add_run`](crate::experiment::ExperimentSequencer::add_run):
//!
//! ```json
//! [
//!   { "axis": { "start": 0.0, "stop": 1.0, "points": 2, "settle_ms": 0 },
//!     "meter": { "min": 0.0, "max": 1.0 } }
//! ]
//! ```

use crate::error::AppResult;
use crate::experiment::Sequence;
use std::fs;
use std::path::Path;
use tracing::info;

/// Saves a sequence to a file.
pub fn save_sequence(path: &Path, sequence: &Sequence) -> AppResult<()> {
    let json = serde_json::to_string_pretty(sequence)?;
    fs::write(path, json)?;
    info!(path = %path.display(), runs = sequence.len(), "Saved sequence");
    Ok(())
}

/// Loads a sequence from a file.
pub fn load_sequence(path: &Path) -> AppResult<Sequence> {
    let json = fs::read_to_string(path)?;
    let sequence: Sequence = serde_json::from_str(&json)?;
    info!(path = %path.display(), runs = sequence.len(), "Loaded sequence");
    Ok(sequence)
}
