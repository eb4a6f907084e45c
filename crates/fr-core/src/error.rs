//! Error types for the fr-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration-related errors
//! that can occur across the workspace.

use camino::Utf8PathBuf;

/// Errors that can occur during configuration loading and validation.
///
/// This error type covers all configuration-related failures including
/// malformed resource paths, duplicate resource names, and parsing errors.
///
/// # Examples
///
/// ```
/// use fr_core::ConfigError;
///
/// let error = ConfigError::DuplicateResource("motd".to_owned());
/// assert!(error.to_string().contains("motd"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The provided path is invalid or malformed.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path.
        path: Utf8PathBuf,
        /// Explanation of why the path is invalid.
        reason: String,
    },

    /// Two resources share the same name.
    #[error("duplicate resource name: {0}")]
    DuplicateResource(String),

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidPath`] error.
    #[inline]
    pub fn invalid_path(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_display() {
        let error = ConfigError::invalid_path("tmp/relative", "path must be absolute");
        let msg = error.to_string();
        assert!(msg.contains("tmp/relative"));
        assert!(msg.contains("must be absolute"));
    }

    #[test]
    fn test_duplicate_resource_display() {
        let error = ConfigError::DuplicateResource("motd".to_owned());
        assert_eq!(error.to_string(), "duplicate resource name: motd");
    }

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::InvalidOption {
            option: "watch.channel_capacity".to_owned(),
            reason: "must be positive".to_owned(),
        };
        let msg = error.to_string();
        assert!(msg.contains("watch.channel_capacity"));
        assert!(msg.contains("must be positive"));
    }
}
