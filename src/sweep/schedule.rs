//! The sweep odometer.
//!
//! Point sources are grouped by coupling level and the groups are ordered from the
//! slowest (lowest level) to the fastest (highest level). Every external
//! [`advance`](SweepSchedule::advance) steps the fastest group; when a group runs
//! dry the carry moves one position slower, exactly like the digits of a
//! mixed-radix counter. Once the slowest group runs dry the sweep is over.
//!
//! ```text
//! level -1: A ─────────────── B ───────────────
//! level  0: (0,2) ── (1,3) ── (0,2) ── (1,3) ──
//! steps:    (0,2,A)  (1,3,A)  (0,2,B)  (1,3,B)
//! ```
//!
//! The carry chain is an index walk over the ordered group list, so deep level
//! hierarchies never recurse, and the stop flag is an explicit shared atomic that
//! other threads can raise through [`stop_handle`](SweepSchedule::stop_handle).

use super::point::PointSource;
use super::sync_group::{Consumer, GroupStep, SyncGroup};
use crate::error::ScheduleError;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// One (level, source, consumer) triple contributed to a schedule.
pub struct ScheduleEntry<T> {
    /// Coupling level; higher levels vary faster.
    pub level: i32,
    /// Restartable point source.
    pub source: Box<dyn PointSource<T>>,
    /// Receives each point the source yields.
    pub consumer: Consumer<T>,
}

impl<T> ScheduleEntry<T> {
    /// Convenience constructor boxing the source and consumer.
    pub fn new<S, C>(level: i32, source: S, consumer: C) -> Self
    where
        S: PointSource<T> + 'static,
        C: FnMut(T) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            level,
            source: Box::new(source),
            consumer: Box::new(consumer),
        }
    }
}

/// Nested-loop walk over the combined point space of all groups.
///
/// Single use: once exhausted or stopped it stays that way. A consumer failure
/// poisons the schedule and later calls return [`ScheduleError::Poisoned`].
pub struct SweepSchedule<T> {
    groups: Vec<SyncGroup<T>>,
    stopped: Arc<AtomicBool>,
    started: bool,
    poisoned: bool,
}

impl<T> SweepSchedule<T> {
    /// Group the entries by level and build one [`SyncGroup`] per level.
    pub fn new(entries: Vec<ScheduleEntry<T>>) -> Result<Self, ScheduleError> {
        if entries.is_empty() {
            return Err(ScheduleError::NoSources);
        }

        let mut by_level: BTreeMap<i32, (Vec<Box<dyn PointSource<T>>>, Vec<Consumer<T>>)> =
            BTreeMap::new();
        for entry in entries {
            let (sources, consumers) = by_level.entry(entry.level).or_default();
            sources.push(entry.source);
            consumers.push(entry.consumer);
        }

        let groups = by_level
            .into_iter()
            .map(|(level, (sources, consumers))| SyncGroup::new(level, sources, consumers))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            levels = groups.len(),
            point_count = groups.iter().map(SyncGroup::cycle_len).product::<usize>(),
            "Built sweep schedule"
        );

        Ok(Self {
            groups,
            stopped: Arc::new(AtomicBool::new(false)),
            started: false,
            poisoned: false,
        })
    }

    /// Prime every group, slowest first, producing the first combination.
    pub fn start(&mut self) -> Result<(), ScheduleError> {
        if self.started {
            return Err(ScheduleError::AlreadyStarted);
        }
        if self.poisoned {
            return Err(ScheduleError::Poisoned);
        }
        self.started = true;

        for idx in 0..self.groups.len() {
            match self.step_group(idx)? {
                GroupStep::Stepped => {}
                GroupStep::Exhausted => {
                    debug!(level = self.groups[idx].level(), "Empty group, nothing to sweep");
                    self.stop();
                    break;
                }
            }
        }
        Ok(())
    }

    /// Move to the next combination.
    ///
    /// Starts the schedule on first use. Returns `Ok(false)` once every
    /// combination has been visited or the schedule was stopped.
    pub fn advance(&mut self) -> Result<bool, ScheduleError> {
        if self.poisoned {
            return Err(ScheduleError::Poisoned);
        }
        if !self.started {
            self.start()?;
            return Ok(!self.is_stopped());
        }
        if self.is_stopped() {
            return Ok(false);
        }

        self.cascade()?;
        Ok(!self.is_stopped())
    }

    /// Request the sweep to end at the next exhaustion point. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Whether the schedule is exhausted or was stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Shared flag that stops this schedule when raised.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }

    /// Total combinations: the product of every level's cycle length.
    pub fn point_count(&self) -> usize {
        self.groups.iter().map(SyncGroup::cycle_len).product()
    }

    /// Coupling levels, slowest first.
    pub fn levels(&self) -> Vec<i32> {
        self.groups.iter().map(SyncGroup::level).collect()
    }

    fn cascade(&mut self) -> Result<(), ScheduleError> {
        let mut idx = self.groups.len() - 1;
        loop {
            match self.step_group(idx)? {
                GroupStep::Stepped => break,
                GroupStep::Exhausted if idx == 0 => {
                    trace!("Slowest group exhausted, sweep complete");
                    self.stop();
                    break;
                }
                GroupStep::Exhausted => idx -= 1,
            }
        }

        if self.is_stopped() {
            return Ok(());
        }

        for reset_idx in idx + 1..self.groups.len() {
            trace!(level = self.groups[reset_idx].level(), "Carry reset");
            if let Err(err) = self.groups[reset_idx].reset() {
                self.poisoned = true;
                return Err(err);
            }
        }
        Ok(())
    }

    fn step_group(&mut self, idx: usize) -> Result<GroupStep, ScheduleError> {
        let result = self.groups[idx].advance();
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }
}

impl<T> fmt::Debug for SweepSchedule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweepSchedule")
            .field("groups", &self.groups)
            .field("started", &self.started)
            .field("stopped", &self.is_stopped())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::point::VecSource;
    use parking_lot::Mutex;

    type Slots = Arc<Mutex<Vec<Option<char>>>>;

    fn slot_writer(
        slots: &Slots,
        index: usize,
    ) -> impl FnMut(char) -> anyhow::Result<()> + Send + 'static {
        let slots = Arc::clone(slots);
        move |value| {
            slots.lock()[index] = Some(value);
            Ok(())
        }
    }

    fn snapshot(slots: &Slots) -> String {
        slots.lock().iter().map(|c| c.unwrap_or('_')).collect()
    }

    #[test]
    fn start_twice_is_misuse() {
        let mut schedule =
            SweepSchedule::new(vec![ScheduleEntry::new(0, VecSource::new(vec![1]), |_| Ok(()))])
                .unwrap();
        schedule.start().unwrap();
        assert!(matches!(
            schedule.start(),
            Err(ScheduleError::AlreadyStarted)
        ));
    }

    #[test]
    fn empty_entries_rejected() {
        let err = SweepSchedule::<i32>::new(Vec::new()).unwrap_err();
        assert!(matches!(err, ScheduleError::NoSources));
    }

    #[test]
    fn three_levels_cascade_slowest_last() {
        let slots: Slots = Arc::new(Mutex::new(vec![None; 3]));
        let mut schedule = SweepSchedule::new(vec![
            ScheduleEntry::new(5, VecSource::new(vec!['a', 'b']), slot_writer(&slots, 2)),
            ScheduleEntry::new(-3, VecSource::new(vec!['X', 'Y']), slot_writer(&slots, 0)),
            ScheduleEntry::new(1, VecSource::new(vec!['0', '1', '2']), slot_writer(&slots, 1)),
        ])
        .unwrap();

        assert_eq!(schedule.levels(), vec![-3, 1, 5]);
        assert_eq!(schedule.point_count(), 12);

        let mut seen = Vec::new();
        while schedule.advance().unwrap() {
            seen.push(snapshot(&slots));
        }
        assert_eq!(seen.len(), 12);
        assert_eq!(&seen[..4], &["X0a", "X0b", "X1a", "X1b"]);
        assert_eq!(seen[6], "Y0a");
        assert_eq!(seen[11], "Y2b");
        assert!(!schedule.advance().unwrap());
    }

    #[test]
    fn stop_takes_effect_at_next_advance() {
        let mut schedule = SweepSchedule::new(vec![ScheduleEntry::new(
            0,
            VecSource::new(vec![1, 2, 3]),
            |_| Ok(()),
        )])
        .unwrap();

        assert!(schedule.advance().unwrap());
        schedule.stop_handle().store(true, Ordering::SeqCst);
        assert!(!schedule.advance().unwrap());
        schedule.stop();
        assert!(!schedule.advance().unwrap());
    }

    #[test]
    fn consumer_error_poisons_schedule() {
        let mut calls = 0;
        let mut schedule = SweepSchedule::new(vec![ScheduleEntry::new(
            0,
            VecSource::new(vec![1, 2, 3]),
            move |_| {
                calls += 1;
                if calls == 2 {
                    anyhow::bail!("device refused point");
                }
                Ok(())
            },
        )])
        .unwrap();

        assert!(schedule.advance().unwrap());
        assert!(matches!(
            schedule.advance(),
            Err(ScheduleError::Consumer { level: 0, .. })
        ));
        assert!(matches!(schedule.advance(), Err(ScheduleError::Poisoned)));
    }

    #[test]
    fn empty_group_yields_no_points() {
        let mut schedule = SweepSchedule::new(vec![
            ScheduleEntry::new(0, VecSource::new(vec![1, 2]), |_| Ok(())),
            ScheduleEntry::new(1, VecSource::<i32>::new(Vec::new()), |_| Ok(())),
        ])
        .unwrap();

        assert_eq!(schedule.point_count(), 0);
        assert!(!schedule.advance().unwrap());
        assert!(schedule.is_stopped());
    }
}
