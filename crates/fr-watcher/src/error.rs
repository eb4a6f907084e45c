//! Error types for the fr-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can end a
//! resource's watch loop.

use camino::Utf8PathBuf;

/// Errors that can occur while running a watch loop.
///
/// Every variant ends the loop. A watch registration that fails because the
/// path does not exist is never surfaced: the loop moves its anchor one level
/// up and retries. Events on non-UTF-8 paths are logged and skipped.
///
/// # Error Recovery Strategy
///
/// - **Exhausted** ([`WatchError::Exhausted`]): the OS refuses more watches
///   and drift would go unnoticed. What happens to the process is the
///   caller's decision.
/// - **Registration / Notify**: propagate immediately.
/// - **Channel closed** ([`WatchError::ChannelClosed`]): the scheduler is
///   gone.
///
/// # Examples
///
/// ```
/// use fr_watcher::WatchError;
///
/// let err = WatchError::Exhausted { path: "/srv/www".into() };
/// assert!(err.is_exhausted());
/// assert_eq!(err.path().map(|p| p.as_str()), Some("/srv/www"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The notify backend failed while running.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The OS watch table is full.
    #[error("out of filesystem watches while watching {path}")]
    Exhausted {
        /// The path whose registration failed.
        path: Utf8PathBuf,
    },

    /// Registering a watch failed for a reason other than a missing path.
    #[error("failed to watch {path}: {source}")]
    Registration {
        /// The path whose registration failed.
        path: Utf8PathBuf,
        /// The underlying notify error.
        #[source]
        source: notify::Error,
    },

    /// The scheduler side of the notification channel went away.
    #[error("recheck channel closed unexpectedly")]
    ChannelClosed,

    /// The watch target cannot be watched at all.
    #[error("invalid watch target '{path}': {reason}")]
    InvalidTarget {
        /// The configured target.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl WatchError {
    /// Creates a new [`WatchError::Registration`] error.
    #[inline]
    pub fn registration(path: impl Into<Utf8PathBuf>, source: notify::Error) -> Self {
        Self::Registration {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the OS ran out of watches.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Exhausted { path } | Self::Registration { path, .. } => Some(path),
            Self::Notify(_) | Self::ChannelClosed | Self::InvalidTarget { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted() {
        let err = WatchError::Exhausted {
            path: Utf8PathBuf::from("/srv"),
        };
        assert!(err.is_exhausted());
        assert_eq!(err.path().map(|p| p.as_str()), Some("/srv"));
        assert_eq!(err.to_string(), "out of filesystem watches while watching /srv");
    }

    #[test]
    fn test_registration() {
        let err = WatchError::registration("/srv", notify::Error::generic("boom"));
        assert!(!err.is_exhausted());
        assert_eq!(err.path().map(|p| p.as_str()), Some("/srv"));
        assert!(err.to_string().contains("/srv"));
    }

    #[test]
    fn test_channel_closed() {
        let err = WatchError::ChannelClosed;
        assert!(!err.is_exhausted());
        assert!(err.path().is_none());
    }

    #[test]
    fn test_invalid_target() {
        let err = WatchError::InvalidTarget {
            path: "tmp/x".to_owned(),
            reason: "path must be absolute",
        };
        assert_eq!(
            err.to_string(),
            "invalid watch target 'tmp/x': path must be absolute"
        );
    }
}
