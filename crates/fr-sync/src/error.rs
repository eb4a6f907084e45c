//! Error types for the fr-sync crate.
//!
//! This module provides the [`SyncError`] type for errors that can occur
//! while digesting files and synchronizing directory trees.

use camino::Utf8PathBuf;

/// Errors that can occur during digest and synchronization operations.
///
/// # Error Recovery Strategy
///
/// - **Per-entry errors** ([`SyncError::Io`], [`SyncError::Walk`],
///   [`SyncError::NonUtf8Path`]): during apply they are logged, counted and
///   skipped; the pass then ends with [`SyncError::Incomplete`].
/// - **Source errors** ([`SyncError::InvalidSource`]): fatal, nothing is
///   touched.
/// - In check mode every error propagates immediately.
///
/// # Examples
///
/// ```
/// use std::io;
/// use fr_sync::SyncError;
///
/// let err = SyncError::io("/srv/www/index.html", io::Error::from(io::ErrorKind::NotFound));
/// assert!(err.is_not_found());
/// assert!(err.is_recoverable());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// An I/O operation on a specific path failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path being operated on.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// The synchronization source is missing or is not a directory.
    #[error("invalid source directory {path}: {reason}")]
    InvalidSource {
        /// The configured source path.
        path: Utf8PathBuf,
        /// Why it cannot be used.
        reason: &'static str,
    },

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// An apply pass finished but some entries could not be synchronized.
    #[error("synchronization of {path} incomplete: {failed} entries failed")]
    Incomplete {
        /// Number of entries that failed.
        failed: u64,
        /// The destination root.
        path: Utf8PathBuf,
    },
}

impl SyncError {
    /// Creates a new [`SyncError::Io`] error.
    #[inline]
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this is an I/O error caused by a missing path.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    /// Returns `true` if the error concerns a single entry and the
    /// surrounding pass can continue.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Walk(_) | Self::NonUtf8Path(_))
    }

    /// Returns `true` if this error is fatal for the operation.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Io { path, .. } | Self::InvalidSource { path, .. } | Self::Incomplete { path, .. } => {
                Some(path)
            }
            Self::Walk(_) | Self::NonUtf8Path(_) => None,
        }
    }
}
