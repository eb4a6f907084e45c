//! Error types for the fr-resource crate.
//!
//! [`ResourceError`] is what `CheckApply` and graph preparation report to the
//! scheduler. Lower-level failures from the synchronizer and configuration
//! layer convert into it with `?`.

use camino::Utf8PathBuf;
use fr_core::ConfigError;
use fr_sync::SyncError;

/// Errors that can occur while checking, applying, or ordering resources.
///
/// # Examples
///
/// ```
/// use fr_resource::ResourceError;
///
/// let err = ResourceError::NotEmpty { path: "/srv/www".into() };
/// assert!(err.is_recoverable());
/// assert_eq!(err.path().map(|p| p.as_str()), Some("/srv/www"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// A filesystem operation on the managed path failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path being operated on.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The resource definition is malformed.
    #[error("invalid resource '{name}': {source}")]
    InvalidConfiguration {
        /// Name of the offending resource.
        name: String,
        /// What is wrong with it.
        #[source]
        source: ConfigError,
    },

    /// The path exists but is the wrong kind of filesystem object.
    #[error("{path} is a {found}, expected a {expected}")]
    TypeMismatch {
        /// The managed path.
        path: Utf8PathBuf,
        /// The kind the resource manages.
        expected: &'static str,
        /// The kind found on disk.
        found: &'static str,
    },

    /// An absent directory still has children.
    #[error("cannot remove {path}: directory not empty")]
    NotEmpty {
        /// The directory that could not be removed.
        path: Utf8PathBuf,
    },

    /// Directory synchronization failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Auto-edges form a cycle, so no apply order exists.
    #[error("dependency cycle between resources: {}", resources.join(", "))]
    Cycle {
        /// Names of the resources left on the cycle.
        resources: Vec<String>,
    },
}

impl ResourceError {
    /// Creates a new [`ResourceError::Io`] error.
    #[inline]
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`ResourceError::InvalidConfiguration`] error.
    #[inline]
    pub fn invalid(name: impl Into<String>, source: ConfigError) -> Self {
        Self::InvalidConfiguration {
            name: name.into(),
            source,
        }
    }

    /// Returns `true` if a later attempt may succeed without changing the
    /// resource definition.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } | Self::NotEmpty { .. } => true,
            Self::Sync(err) => err.is_recoverable() || matches!(err, SyncError::Incomplete { .. }),
            Self::InvalidConfiguration { .. } | Self::TypeMismatch { .. } | Self::Cycle { .. } => false,
        }
    }

    /// Returns `true` if retrying cannot help.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Io { path, .. } | Self::TypeMismatch { path, .. } | Self::NotEmpty { path } => Some(path),
            Self::Sync(err) => err.path(),
            Self::InvalidConfiguration { .. } | Self::Cycle { .. } => None,
        }
    }
}
