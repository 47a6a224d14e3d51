//! Round-robin selection.
//!
//! [`RotationCursor`] is advanced once per dispatch call and decides where
//! that call starts; [`Rotation`] then yields every index exactly once,
//! wrapping around the end of the list.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter shared by all dispatch calls on one client.
///
/// The counter is never reset; wrap-around only happens in the modulo step
/// of [`Rotation::new`].
#[derive(Debug, Default)]
pub struct RotationCursor {
    next: AtomicU64,
}

impl RotationCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one and return the value before the increment.
    pub fn advance(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Current counter value (number of advances so far).
    pub fn current(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// Failover order for one dispatch: `start, start + 1, …` modulo `len`.
#[derive(Debug, Clone)]
pub struct Rotation {
    start: usize,
    len: usize,
    step: usize,
}

impl Rotation {
    /// Build the order for a list of `len` sockets from a cursor value.
    pub fn new(cursor: u64, len: usize) -> Self {
        let start = if len == 0 {
            0
        } else {
            (cursor % len as u64) as usize
        };
        Self {
            start,
            len,
            step: 0,
        }
    }

    /// Index of the first socket tried.
    pub fn start(&self) -> usize {
        self.start
    }
}

impl Iterator for Rotation {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.step >= self.len {
            return None;
        }
        let index = (self.start + self.step) % self.len;
        self.step += 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.step;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Rotation {}
