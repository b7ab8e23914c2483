//! Sweep progress with elapsed and remaining time estimates.

use std::time::{Duration, Instant};

/// Counts completed steps against a known total.
///
/// The remaining time is a linear extrapolation of the average step time so far.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    total: usize,
    done: usize,
    started: Option<Instant>,
}

impl ProgressTracker {
    /// Idle tracker with no total.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the counter and the clock for a sweep of `total` steps.
    pub fn start(&mut self, total: usize) {
        self.total = total;
        self.done = 0;
        self.started = Some(Instant::now());
    }

    /// Record `n` more completed steps.
    pub fn advance(&mut self, n: usize) {
        self.done = (self.done + n).min(self.total);
    }

    /// Steps recorded so far.
    pub fn done(&self) -> usize {
        self.done
    }

    /// Steps expected.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Completed share in `[0, 1]`. An empty sweep counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f64 / self.total as f64
        }
    }

    /// Time since [`start`](Self::start); zero before it.
    pub fn elapsed(&self) -> Duration {
        self.started.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Estimated time left, `None` until the first step completes.
    pub fn remaining(&self) -> Option<Duration> {
        self.estimate_remaining(self.elapsed())
    }

    fn estimate_remaining(&self, elapsed: Duration) -> Option<Duration> {
        if self.done == 0 {
            return None;
        }
        let left = (self.total - self.done) as f64;
        Some(elapsed.mul_f64(left / self.done as f64))
    }

    /// `done/total`.
    pub fn label(&self) -> String {
        format!("{}/{}", self.done, self.total)
    }
}
