//! Deferred, phase-batched task execution.
//!
//! The sweep schedule feeds points to consumers synchronously, but talking to
//! instruments is slow and async. The [`Dispatcher`] bridges the two: a wrapped
//! function only *enqueues* its call, and [`Dispatcher::drain_and_run`] later runs
//! everything queued for the current phase concurrently on a bounded pool and
//! waits for all of it.
//!
//! # Guarantees
//!
//! - Every drained task runs to completion, even when a sibling fails.
//! - Results come back in submission order; completion order is unspecified.
//! - No locking is provided between tasks of one phase. Callers are responsible
//!   for only batching calls that touch disjoint instrument state.
//!
//! # Failures
//!
//! A single failing task is returned as-is. When several fail in one phase the
//! failures are aggregated into [`SweepError::Multiple`], ordered by submission.

use crate::error::{AppResult, SweepError};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// A queued unit of work.
pub type Task<T> = BoxFuture<'static, AppResult<T>>;

/// Upper bound used when no worker count is configured.
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
    (cpus + 4).min(32)
}

/// Batches calls and runs each batch concurrently.
pub struct Dispatcher<T> {
    queue: Arc<Mutex<Vec<Task<T>>>>,
    max_workers: usize,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            max_workers: self.max_workers,
        }
    }
}

impl<T> fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.queue.lock().len())
            .field("max_workers", &self.max_workers)
            .finish()
    }
}

impl<T> Default for Dispatcher<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new(default_workers())
    }
}

impl<T> Dispatcher<T>
where
    T: Send + 'static,
{
    /// Create a dispatcher running at most `max_workers` tasks at once.
    pub fn new(max_workers: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(Vec::new())),
            max_workers: max_workers.max(1),
        }
    }

    /// Concurrency bound for each drain.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Queue a future for the next drain.
    pub fn submit<F>(&self, task: F)
    where
        F: Future<Output = AppResult<T>> + Send + 'static,
    {
        self.queue.lock().push(Box::pin(task));
    }

    /// Wrap `f` so calling the result queues `f(args)` instead of running it.
    pub fn wrap<A, F, Fut>(&self, f: F) -> impl Fn(A) + Send + Sync + 'static
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let queue = Arc::clone(&self.queue);
        move |args| queue.lock().push(Box::pin(f(args)))
    }

    /// Number of tasks waiting for the next drain.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Drop every queued task without running it.
    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    /// Run every queued task concurrently and wait for all of them.
    ///
    /// The queue is emptied before anything runs, so tasks queued by the running
    /// tasks themselves belong to the next drain.
    pub async fn drain_and_run(&self) -> AppResult<Vec<T>> {
        let tasks = std::mem::take(&mut *self.queue.lock());
        let count = tasks.len();
        if count == 0 {
            return Ok(Vec::new());
        }
        debug!(tasks = count, max_workers = self.max_workers, "Draining dispatch queue");

        let permits = Arc::new(Semaphore::new(self.max_workers));
        let mut set = JoinSet::new();
        for (index, task) in tasks.into_iter().enumerate() {
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (index, task.await)
            });
        }

        let mut slots: Vec<Option<AppResult<T>>> = (0..count).map(|_| None).collect();
        let mut panics = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(join_err) => {
                    warn!(error = %join_err, "Dispatched task did not complete");
                    panics.push(SweepError::TaskPanicked(join_err.to_string()));
                }
            }
        }

        let mut results = Vec::with_capacity(count);
        let mut failures = Vec::new();
        for result in slots.into_iter().flatten() {
            match result {
                Ok(value) => results.push(value),
                Err(err) => failures.push(err),
            }
        }
        failures.extend(panics);

        if failures.len() > 1 {
            warn!(failed = failures.len(), tasks = count, "Multiple dispatched tasks failed");
            return Err(SweepError::Multiple(failures));
        }
        match failures.pop() {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }
}
