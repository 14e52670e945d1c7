//! Rotation-with-preference pool selection.
//!
//! Requests rotate through the pools in registration order. Starting at the
//! cursor, the first pool with nobody waiting wins; if every pool has a
//! queue, the pool at the cursor is used. The cursor then moves one past
//! the pool that was picked.

use std::sync::{Arc, Mutex, PoisonError};

/// What the selector needs to know about a pool.
pub trait Backlog {
    /// Number of callers queued on the pool.
    fn pending(&self) -> usize;
}

impl<T: Backlog + ?Sized> Backlog for Arc<T> {
    fn pending(&self) -> usize {
        (**self).pending()
    }
}

impl<R> Backlog for crate::pool::Pool<R> {
    fn pending(&self) -> usize {
        self.pending_count()
    }
}

/// Index of the pool to use when the cursor sits at `start`.
///
/// `pools` must be non-empty and `start` a valid index into it.
pub fn preferred<P: Backlog>(pools: &[P], start: usize) -> usize {
    (0..pools.len())
        .map(|offset| (start + offset) % pools.len())
        .find(|&index| pools[index].pending() == 0)
        .unwrap_or(start)
}

/// Rotation cursor shared by all requests of one cluster.
#[derive(Debug, Default)]
pub struct Rotation {
    cursor: Mutex<usize>,
}

impl Rotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next scan starts from.
    pub fn cursor(&self) -> usize {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick a pool and advance the cursor. `None` when there are no pools.
    pub fn next<P: Backlog>(&self, pools: &[P]) -> Option<usize> {
        self.dispatch(pools, |index, _| index)
    }

    /// Pick a pool, advance the cursor and run `f` on the pick.
    ///
    /// The cursor stays locked while `f` runs, so whatever `f` queues on
    /// the pool is visible to the next selection.
    pub fn dispatch<P, T, F>(&self, pools: &[P], f: F) -> Option<T>
    where
        P: Backlog,
        F: FnOnce(usize, &P) -> T,
    {
        if pools.is_empty() {
            return None;
        }

        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let start = *cursor % pools.len();
        let index = preferred(pools, start);
        *cursor = (index + 1) % pools.len();
        Some(f(index, &pools[index]))
    }
}
