//! Lockstep advancement of the point sources sharing one coupling level.

use super::point::{PointCursor, PointSource};
use crate::error::ScheduleError;
use std::fmt;

/// Receives one point per step from its paired source.
pub type Consumer<T> = Box<dyn FnMut(T) -> anyhow::Result<()> + Send>;

/// Outcome of a single [`SyncGroup::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStep {
    /// Every source yielded and every consumer ran.
    Stepped,
    /// At least one cursor ran dry; nothing was consumed. The caller must carry
    /// into the next-slower level and then [`reset`](SyncGroup::reset) this group.
    Exhausted,
}

/// Parallel (source, consumer) pairs advanced together.
///
/// All consumers of a group see the values of the same logical step: the group
/// pulls from every cursor before it hands anything out.
pub struct SyncGroup<T> {
    level: i32,
    sources: Vec<Box<dyn PointSource<T>>>,
    consumers: Vec<Consumer<T>>,
    cursors: Vec<PointCursor<T>>,
}

impl<T> SyncGroup<T> {
    /// Build a group, validating arity and declared cycle lengths.
    pub fn new(
        level: i32,
        sources: Vec<Box<dyn PointSource<T>>>,
        consumers: Vec<Consumer<T>>,
    ) -> Result<Self, ScheduleError> {
        if sources.len() != consumers.len() {
            return Err(ScheduleError::ArityMismatch {
                sources: sources.len(),
                consumers: consumers.len(),
            });
        }
        let lengths: Vec<usize> = sources.iter().map(|s| s.len()).collect();
        if lengths.windows(2).any(|w| w[0] != w[1]) {
            return Err(ScheduleError::UnevenCoupling { level, lengths });
        }

        let cursors = sources.iter().map(|s| s.cursor()).collect();
        Ok(Self {
            level,
            sources,
            consumers,
            cursors,
        })
    }

    /// Coupling level shared by every source in the group.
    pub fn level(&self) -> i32 {
        self.level
    }

    /// Number of (source, consumer) pairs.
    pub fn width(&self) -> usize {
        self.sources.len()
    }

    /// Points per cycle, as declared by the sources.
    pub fn cycle_len(&self) -> usize {
        self.sources.first().map_or(0, |s| s.len())
    }

    /// Pull one value from every cursor and feed the consumers.
    pub fn advance(&mut self) -> Result<GroupStep, ScheduleError> {
        let mut values = Vec::with_capacity(self.cursors.len());
        for cursor in &mut self.cursors {
            match cursor.next() {
                Some(value) => values.push(value),
                None => return Ok(GroupStep::Exhausted),
            }
        }

        for (consumer, value) in self.consumers.iter_mut().zip(values) {
            consumer(value).map_err(|source| ScheduleError::Consumer {
                level: self.level,
                source,
            })?;
        }
        Ok(GroupStep::Stepped)
    }

    /// Obtain fresh cursors from every source and step once, so valid values are
    /// left behind.
    pub fn reset(&mut self) -> Result<(), ScheduleError> {
        self.cursors = self.sources.iter().map(|s| s.cursor()).collect();
        match self.advance()? {
            GroupStep::Stepped => Ok(()),
            GroupStep::Exhausted => Err(ScheduleError::EmptyCycle { level: self.level }),
        }
    }
}

impl<T> fmt::Debug for SyncGroup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncGroup")
            .field("level", &self.level)
            .field("width", &self.width())
            .field("cycle_len", &self.cycle_len())
            .finish()
    }
}
