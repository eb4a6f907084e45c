//! Configuration structures for fr-converge.
//!
//! This module provides configuration types for all components of the engine:
//!
//! - [`WatchConfig`] - Watch loop settings (channel sizing, recursion, exhaustion policy)
//! - [`SyncConfig`] - Directory synchronizer settings (check-mode strictness)
//! - [`ConvergerConfig`] - Idle detection interval for the convergence registry
//! - [`Config`] - Root configuration combining all settings and the resource list
//!
//! All configuration types implement [`Default`] and deserialize with
//! `#[serde(default)]`, so a configuration file only has to name what it changes.

use std::time::Duration;

use camino::Utf8Path;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::FileSpec;

/// What the supervisor does when the OS refuses to register more watches.
///
/// Running out of watch descriptors means a resource can no longer observe
/// drift. The watch loop always stops with a fatal error in that case; this
/// policy only decides what the process does about it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ExhaustionPolicy {
    /// Shut every watch loop down and exit with a failure status.
    #[default]
    Terminate,
    /// Log the failure and keep the remaining resources running unwatched.
    Unwatch,
}

/// How directory resources with a source tree are checked for convergence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DirCheckMode {
    /// Walk only the paths the source tree expects. Extra destination
    /// entries go unnoticed until the next apply.
    #[default]
    Probe,
    /// Additionally walk the destination and treat any entry without a
    /// source counterpart as drift.
    Strict,
}

/// Configuration for the per-resource watch loop.
///
/// # Examples
///
/// ```
/// use fr_core::{ExhaustionPolicy, WatchConfig};
///
/// let config = WatchConfig::default();
/// assert_eq!(config.channel_capacity, 100);
/// assert!(config.recursive_dirs);
/// assert_eq!(config.on_exhausted, ExhaustionPolicy::Terminate);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Capacity of the raw filesystem event channel between the notify
    /// thread and the watch loop.
    pub channel_capacity: usize,

    /// Whether directory targets subscribe every subdirectory once the
    /// anchor reaches full depth.
    pub recursive_dirs: bool,

    /// What to do when watch registration hits the OS limit.
    pub on_exhausted: ExhaustionPolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
            recursive_dirs: true,
            on_exhausted: ExhaustionPolicy::Terminate,
        }
    }
}

/// Configuration for the directory synchronizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Strictness of the read-only comparison used by `CheckApply`.
    pub dir_check: DirCheckMode,
}

/// Configuration for the convergence registry.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fr_core::ConvergerConfig;
///
/// let config = ConvergerConfig { timeout_secs: Some(5) };
/// assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
/// assert_eq!(ConvergerConfig::default().timeout(), None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergerConfig {
    /// Seconds without activity after which a resource counts as converged.
    /// `None` disables idle detection.
    pub timeout_secs: Option<u64>,
}

impl ConvergerConfig {
    /// Returns the idle interval as a [`Duration`], if enabled.
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Root configuration for fr-converge.
///
/// Combines all component configurations and the list of managed file
/// resources into a single structure loaded from a JSON file.
///
/// # Examples
///
/// ```
/// use fr_core::Config;
///
/// let json = r#"{"resources": [{"name": "motd", "path": "/etc/motd", "content": "hi\n"}]}"#;
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.resources.len(), 1);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Watch loop configuration.
    pub watch: WatchConfig,

    /// Directory synchronizer configuration.
    pub sync: SyncConfig,

    /// Convergence registry configuration.
    pub converger: ConvergerConfig,

    /// Managed file resources.
    pub resources: Vec<FileSpec>,
}

impl Config {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid JSON for this schema, and
    /// any error from [`Config::validate`].
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for a zero channel capacity and
    /// [`ConfigError::DuplicateResource`] when two resources share a name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.channel_capacity == 0 {
            return Err(ConfigError::InvalidOption {
                option: "watch.channel_capacity".to_owned(),
                reason: "must be positive".to_owned(),
            });
        }

        let mut names = FxHashSet::with_capacity_and_hasher(self.resources.len(), Default::default());
        for spec in &self.resources {
            if !names.insert(spec.name.as_str()) {
                return Err(ConfigError::DuplicateResource(spec.name.clone()));
            }
        }

        Ok(())
    }
}
