//! Socket registry — the in-memory list of known instance sockets.
//!
//! Paths are merged in, never replaced or evicted, so the registry only
//! grows. Writers hold the lock just long enough to append; readers take a
//! cheap [`Arc`] snapshot so a dispatch sees one consistent view for its
//! whole lifetime without holding the lock across I/O.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// Deduplicated, insertion-ordered collection of socket paths.
#[derive(Debug, Default)]
pub struct SocketRegistry {
    sockets: RwLock<Arc<Vec<PathBuf>>>,
}

impl SocketRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every path not already present, preserving first-seen order.
    ///
    /// Returns the number of paths actually added.
    pub fn merge<I>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut guard = self
            .sockets
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut added = 0;
        for path in paths {
            // Linear scan; instance counts are small.
            if guard.contains(&path) {
                continue;
            }
            Arc::make_mut(&mut guard).push(path);
            added += 1;
        }
        added
    }

    /// An immutable view of the current socket list.
    ///
    /// Later merges do not affect a snapshot already taken.
    pub fn snapshot(&self) -> Arc<Vec<PathBuf>> {
        let guard = self
            .sockets
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Number of known sockets.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether no sockets are known yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
