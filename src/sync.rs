//! Small lock-free coordination primitives shared by the workers.

use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Unbounded FIFO drained with non-blocking pops.
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: SegQueue<T>,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            items: SegQueue::new(),
        }
    }

    pub fn push(&self, item: T) {
        self.items.push(item);
    }

    /// Returns `None` once the queue is empty; callers treat that as the end of their share.
    pub fn pop(&self) -> Option<T> {
        self.items.pop()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for WorkQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let queue = Self::new();
        for item in iter {
            queue.push(item);
        }
        queue
    }
}

/// Shared index handing out positions of a list, one claim per fetch-and-add.
#[derive(Debug, Default)]
pub struct AtomicCursor {
    next: AtomicUsize,
}

impl AtomicCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next index below `len`, or `None` when the list is exhausted.
    pub fn claim(&self, len: usize) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        (index < len).then_some(index)
    }

    pub fn reset(&self) {
        self.next.store(0, Ordering::Relaxed);
    }
}

/// One-shot election: exactly one caller of `try_claim` ever wins.
#[derive(Debug, Default)]
pub struct LeaderFlag {
    claimed: AtomicBool,
}

impl LeaderFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}
