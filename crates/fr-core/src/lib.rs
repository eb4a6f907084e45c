//! Core types, configuration, errors, and utilities for fr-converge.
//!
//! This crate provides the foundational pieces shared by every other crate in
//! the workspace:
//!
//! - [`ConfigError`] for configuration loading and validation failures
//! - Configuration structures ([`Config`], [`WatchConfig`], [`SyncConfig`],
//!   [`ConvergerConfig`])
//! - Domain types ([`FileSpec`], [`ResourceState`], [`ResourceUuid`])
//! - Path arithmetic used by the watcher and the auto-edge generator
//!   ([`paths`])

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{
    Config, ConvergerConfig, DirCheckMode, ExhaustionPolicy, SyncConfig, WatchConfig,
};
pub use error::ConfigError;
pub use types::{FileSpec, ResourceState, ResourceUuid};
