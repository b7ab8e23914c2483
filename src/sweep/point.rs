//! Restartable point sources.
//!
//! A device describes its sweep axis as a finite, lazily generated sequence of
//! argument tuples. The schedule never rewinds a cursor: restarting a source means
//! asking it for a brand new cursor, so any state the generator needs lives inside
//! the cursor it hands out.

use std::fmt;
use std::sync::Arc;

/// A fresh, single-pass view over a source's points.
pub type PointCursor<T> = Box<dyn Iterator<Item = T> + Send>;

/// Factory for restartable point sequences.
///
/// # Contract
/// - Every call to [`cursor`](PointSource::cursor) starts from the first point.
/// - [`len`](PointSource::len) is the number of points one cursor yields; sources
///   coupled at the same level must agree on it.
pub trait PointSource<T>: Send + Sync {
    /// Obtain a fresh cursor positioned before the first point.
    fn cursor(&self) -> PointCursor<T>;

    /// Points per cycle.
    fn len(&self) -> usize;

    /// Whether a cycle yields no points at all.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, S> PointSource<T> for Arc<S>
where
    S: PointSource<T> + ?Sized,
{
    fn cursor(&self) -> PointCursor<T> {
        (**self).cursor()
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// Source backed by an owned list of points.
#[derive(Clone, PartialEq)]
pub struct VecSource<T> {
    points: Arc<Vec<T>>,
}

impl<T> VecSource<T> {
    /// Wrap a list of points.
    pub fn new(points: Vec<T>) -> Self {
        Self {
            points: Arc::new(points),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for VecSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VecSource").field(&self.points).finish()
    }
}

impl<T> From<Vec<T>> for VecSource<T> {
    fn from(points: Vec<T>) -> Self {
        Self::new(points)
    }
}

impl<T> PointSource<T> for VecSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn cursor(&self) -> PointCursor<T> {
        let points = Arc::clone(&self.points);
        Box::new((0..points.len()).map(move |i| points[i].clone()))
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}

type CursorFactory<T> = dyn Fn() -> PointCursor<T> + Send + Sync;

/// Source built from a zero-argument cursor factory and a declared length.
///
/// The factory is re-invoked on every restart, so it can read live device
/// configuration each cycle.
pub struct FnSource<T> {
    factory: Box<CursorFactory<T>>,
    len: usize,
}

impl<T> FnSource<T> {
    /// Create a source from a factory yielding `len` points per cursor.
    pub fn new<F>(len: usize, factory: F) -> Self
    where
        F: Fn() -> PointCursor<T> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            len,
        }
    }
}

impl<T> fmt::Debug for FnSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource").field("len", &self.len).finish()
    }
}

impl<T> PointSource<T> for FnSource<T> {
    fn cursor(&self) -> PointCursor<T> {
        (self.factory)()
    }

    fn len(&self) -> usize {
        self.len
    }
}
