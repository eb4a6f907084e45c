//! Synchronization statistics with atomic counters.
//!
//! This module provides [`SyncStats`] for counting what an apply pass did and
//! [`SyncReport`] for a point-in-time view of those counters.
//!
//! All counters use [`AtomicU64`] with [`Relaxed`](std::sync::atomic::Ordering::Relaxed)
//! ordering; they are informational and never used for synchronization.
//!
//! # Examples
//!
//! ```
//! use fr_sync::SyncStats;
//!
//! let stats = SyncStats::new();
//! stats.increment_files_copied();
//! stats.increment_entries_removed();
//!
//! let report = stats.snapshot();
//! assert_eq!(report.changed(), 2);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters for one synchronizer.
#[derive(Debug, Default)]
pub struct SyncStats {
    files_copied: AtomicU64,
    links_replaced: AtomicU64,
    entries_removed: AtomicU64,
    dirs_created: AtomicU64,
    unsupported_skipped: AtomicU64,
    failures: AtomicU64,
}

impl SyncStats {
    /// Creates a new [`SyncStats`] with all counters at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a regular file written to the destination.
    #[inline]
    pub fn increment_files_copied(&self) {
        self.files_copied.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a symbolic link created or re-pointed.
    #[inline]
    pub fn increment_links_replaced(&self) {
        self.links_replaced.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a destination entry (file, link or whole subtree) removed.
    #[inline]
    pub fn increment_entries_removed(&self) {
        self.entries_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a directory created.
    #[inline]
    pub fn increment_dirs_created(&self) {
        self.dirs_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a socket, pipe or device left alone.
    #[inline]
    pub fn increment_unsupported(&self) {
        self.unsupported_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts an entry that could not be synchronized.
    #[inline]
    pub fn increment_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of failures so far.
    #[inline]
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> SyncReport {
        SyncReport {
            files_copied: self.files_copied.load(Ordering::Relaxed),
            links_replaced: self.links_replaced.load(Ordering::Relaxed),
            entries_removed: self.entries_removed.load(Ordering::Relaxed),
            dirs_created: self.dirs_created.load(Ordering::Relaxed),
            unsupported_skipped: self.unsupported_skipped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.files_copied.store(0, Ordering::Relaxed);
        self.links_replaced.store(0, Ordering::Relaxed);
        self.entries_removed.store(0, Ordering::Relaxed);
        self.dirs_created.store(0, Ordering::Relaxed);
        self.unsupported_skipped.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
    }
}

/// What one apply pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Regular files written.
    pub files_copied: u64,
    /// Symbolic links created or re-pointed.
    pub links_replaced: u64,
    /// Destination entries removed.
    pub entries_removed: u64,
    /// Directories created.
    pub dirs_created: u64,
    /// Unsupported entries skipped.
    pub unsupported_skipped: u64,
    /// Entries that failed.
    pub failures: u64,
}

impl SyncReport {
    /// Total number of modifications made to the destination.
    #[inline]
    #[must_use]
    pub const fn changed(&self) -> u64 {
        self.files_copied + self.links_replaced + self.entries_removed + self.dirs_created
    }

    /// Returns `true` if the pass modified nothing and nothing failed.
    #[inline]
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.changed() == 0 && self.failures == 0
    }
}
