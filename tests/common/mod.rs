//! Scripted instruments shared by the integration tests.
//!
//! Every device counts its lifecycle calls and can be told to fail on the
//! n-th call of a given operation.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use sweep_daq::data::{into_fields, Fields};
use sweep_daq::hardware::{Configurable, Instrument, Observable, PointArgs};
use sweep_daq::sweep::PointCursor;

/// Lifecycle call counters.
#[derive(Debug, Default)]
pub struct Lifecycle {
    pub initialized: AtomicUsize,
    pub finalized: AtomicUsize,
    pub fail_initialize: bool,
    pub fail_finalize: bool,
}

impl Lifecycle {
    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn finalized(&self) -> usize {
        self.finalized.load(Ordering::SeqCst)
    }

    fn initialize(&self) -> Result<()> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize {
            bail!("device did not respond");
        }
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        self.finalized.fetch_add(1, Ordering::SeqCst);
        if self.fail_finalize {
            bail!("device refused to park");
        }
        Ok(())
    }
}

/// Configurable stepping through a fixed list of values.
#[derive(Debug, Default)]
pub struct ScriptedAxis {
    pub values: Mutex<Vec<f64>>,
    pub calls: Mutex<Vec<f64>>,
    /// 1-based configure call that fails.
    pub fail_on_call: Option<usize>,
    pub lifecycle: Lifecycle,
}

impl ScriptedAxis {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values: Mutex::new(values),
            ..Default::default()
        }
    }

    pub fn failing_on(values: Vec<f64>, call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::new(values)
        }
    }

    pub fn calls(&self) -> Vec<f64> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Instrument for ScriptedAxis {
    async fn initialize(&self) -> Result<()> {
        self.lifecycle.initialize()
    }

    async fn finalize(&self) -> Result<()> {
        self.lifecycle.finalize()
    }

    async fn get_config(&self) -> Result<Value> {
        Ok(json!({ "values": *self.values.lock() }))
    }

    async fn set_config(&self, config: Value) -> Result<()> {
        let values: Vec<f64> = serde_json::from_value(config["values"].clone())?;
        *self.values.lock() = values;
        Ok(())
    }
}

#[async_trait]
impl Configurable for ScriptedAxis {
    fn points(&self) -> PointCursor<PointArgs> {
        let values = self.values.lock().clone();
        Box::new(values.into_iter().map(|v| vec![json!(v)]))
    }

    fn point_amount(&self) -> usize {
        self.values.lock().len()
    }

    async fn configure(&self, args: PointArgs) -> Result<Fields> {
        let value = args.first().and_then(Value::as_f64).unwrap_or_default();
        let call = {
            let mut calls = self.calls.lock();
            calls.push(value);
            calls.len()
        };
        if self.fail_on_call == Some(call) {
            bail!("motor stalled at {value}");
        }
        Ok(into_fields(json!({ "value": value })))
    }
}

/// Observable returning how many times it has been read.
#[derive(Debug, Default)]
pub struct CountingMeter {
    pub reads: AtomicUsize,
    /// 1-based observe call that fails.
    pub fail_on_read: Option<usize>,
    pub lifecycle: Lifecycle,
}

impl CountingMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Instrument for CountingMeter {
    async fn initialize(&self) -> Result<()> {
        self.lifecycle.initialize()
    }

    async fn finalize(&self) -> Result<()> {
        self.lifecycle.finalize()
    }

    async fn get_config(&self) -> Result<Value> {
        Ok(json!({}))
    }

    async fn set_config(&self, _config: Value) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Observable for CountingMeter {
    async fn observe(&self) -> Result<Fields> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_read == Some(read) {
            bail!("overrange");
        }
        Ok(into_fields(json!({ "reads": read })))
    }
}
