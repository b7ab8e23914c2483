//! Append-only log of per-step data rows.
//!
//! The repository is shared between the coordinating task, which appends rows and
//! writes fields, and any number of readers polling for progress. All access goes
//! through a `parking_lot::RwLock`, and readers only ever receive cloned snapshots.
//!
//! # Row shape
//!
//! ```text
//! {
//!   "<component>": { ...result fields... },
//!   "timestamp": { "config_start_time", "observe_start_time", "end_time" },
//!   "run": { "id": 0 }
//! }
//! ```

use super::Fields;
use crate::error::{AppResult, SweepError};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Reserved key holding the step timestamps.
pub const TIMESTAMP_KEY: &str = "timestamp";
/// Reserved key holding the run tag.
pub const RUN_KEY: &str = "run";

/// Whether `name` collides with a reserved row key.
pub fn is_reserved(name: &str) -> bool {
    name == TIMESTAMP_KEY || name == RUN_KEY
}

/// Run a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTag {
    /// Monotonically increasing run identifier.
    pub id: u64,
}

/// Wall-clock boundaries of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// Configure phase dispatched.
    pub config_start_time: DateTime<Utc>,
    /// Observe phase dispatched.
    pub observe_start_time: DateTime<Utc>,
    /// Step finished.
    pub end_time: DateTime<Utc>,
}

/// Everything recorded for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    /// Owning run.
    pub run: RunTag,
    /// Step timing; absent until the step completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamps>,
    /// Results keyed by component name.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Fields>,
}

impl DataRow {
    /// Empty row tagged with `run_id`.
    pub fn new(run_id: u64) -> Self {
        Self {
            run: RunTag { id: run_id },
            timestamp: None,
            fields: BTreeMap::new(),
        }
    }

    /// Result recorded for `component`, if any.
    pub fn get(&self, component: &str) -> Option<&Fields> {
        self.fields.get(component)
    }

    /// The row as exposed downstream.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Ordered, append-only sequence of [`DataRow`]s plus the current run id.
#[derive(Debug, Default)]
pub struct DataRepository {
    rows: RwLock<Vec<DataRow>>,
    run_id: AtomicU64,
}

impl DataRepository {
    /// Create an empty repository starting at run 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new row tagged with `run_id`. Returns its index.
    pub fn begin_row(&self, run_id: u64) -> usize {
        let mut rows = self.rows.write();
        rows.push(DataRow::new(run_id));
        rows.len() - 1
    }

    /// Write `value` under `name` in the most recent row, replacing any earlier value.
    pub fn set_field(&self, name: &str, value: Fields) -> AppResult<()> {
        if is_reserved(name) {
            return Err(SweepError::ReservedName(name.to_string()));
        }
        let mut rows = self.rows.write();
        let row = rows.last_mut().ok_or(SweepError::NoActiveRow)?;
        row.fields.insert(name.to_string(), value);
        Ok(())
    }

    /// Record step timing on the most recent row.
    pub fn set_timestamps(&self, timestamps: Timestamps) -> AppResult<()> {
        let mut rows = self.rows.write();
        let row = rows.last_mut().ok_or(SweepError::NoActiveRow)?;
        row.timestamp = Some(timestamps);
        Ok(())
    }

    /// Snapshot of the most recent row.
    pub fn last_row(&self) -> Option<DataRow> {
        self.rows.read().last().cloned()
    }

    /// Snapshot of the whole log.
    pub fn rows(&self) -> Vec<DataRow> {
        self.rows.read().clone()
    }

    /// Rows appended at or after `index`, for incremental polling.
    pub fn rows_since(&self, index: usize) -> Vec<DataRow> {
        self.rows
            .read()
            .get(index..)
            .map(<[DataRow]>::to_vec)
            .unwrap_or_default()
    }

    /// Rows recorded during run `run_id`.
    pub fn rows_for_run(&self, run_id: u64) -> Vec<DataRow> {
        self.rows
            .read()
            .iter()
            .filter(|row| row.run.id == run_id)
            .cloned()
            .collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether no row has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Identifier new rows should be tagged with.
    pub fn run_id(&self) -> u64 {
        self.run_id.load(Ordering::SeqCst)
    }

    /// Move to the next run id and return it.
    pub fn next_run(&self) -> u64 {
        self.run_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}
