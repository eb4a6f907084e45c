//! The capability every managed resource offers the scheduler.
//!
//! Resource kinds form a closed set, so the scheduler holds them as
//! [`AnyResource`] and dispatches with a `match` instead of trait objects.

use std::future::Future;

use fr_core::{Config, ResourceUuid};
use fr_watcher::{WatchContext, WatchError};

use crate::autoedge::AutoEdge;
use crate::error::ResourceError;
use crate::file::{self, FileResource};

/// What the scheduler needs from a resource.
pub trait Resource: Send + Sync {
    /// Unique name within the graph.
    fn name(&self) -> &str;

    /// Kind tag, e.g. `"file"`.
    fn kind(&self) -> &'static str;

    /// Checks the definition before anything runs.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidConfiguration`] for a malformed
    /// definition.
    fn validate(&self) -> Result<(), ResourceError>;

    /// Long-running change subscription; returns when told to exit.
    fn watch(&self, ctx: WatchContext) -> impl Future<Output = Result<(), WatchError>> + Send;

    /// Reports whether the resource is converged and, if `apply` is set,
    /// converges it. See [`FileResource::check_apply`] for the contract.
    ///
    /// # Errors
    ///
    /// Any failure to inspect or change the system.
    fn check_apply(&self, apply: bool) -> Result<bool, ResourceError>;

    /// Identities used for deduplication and edge matching.
    fn uuids(&self) -> Vec<ResourceUuid>;

    /// Whether `other` may be merged into this resource. Never for files.
    fn group_cmp(&self, other: &AnyResource) -> bool;

    /// Whether `other` describes the same desired state.
    fn compare(&self, other: &AnyResource) -> bool;

    /// Candidate identities this resource implicitly depends on.
    fn auto_edges(&self) -> Box<dyn AutoEdge>;
}

impl Resource for FileResource {
    fn name(&self) -> &str {
        Self::name(self)
    }

    fn kind(&self) -> &'static str {
        file::KIND
    }

    fn validate(&self) -> Result<(), ResourceError> {
        Self::validate(self)
    }

    fn watch(&self, ctx: WatchContext) -> impl Future<Output = Result<(), WatchError>> + Send {
        Self::watch(self, ctx)
    }

    fn check_apply(&self, apply: bool) -> Result<bool, ResourceError> {
        Self::check_apply(self, apply)
    }

    fn uuids(&self) -> Vec<ResourceUuid> {
        Self::uuids(self)
    }

    fn group_cmp(&self, _other: &AnyResource) -> bool {
        false
    }

    fn compare(&self, other: &AnyResource) -> bool {
        match other {
            AnyResource::File(other) => self.same_as(other),
        }
    }

    fn auto_edges(&self) -> Box<dyn AutoEdge> {
        Box::new(Self::auto_edges(self))
    }
}

/// Every resource kind the engine knows.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyResource {
    /// A managed file or directory.
    File(FileResource),
}

impl AnyResource {
    /// Resolved path of the managed object.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::File(r) => r.get_path(),
        }
    }

    /// Builds and validates one resource per configured definition.
    ///
    /// Global watch and sync settings are applied to every resource.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResourceError::InvalidConfiguration`] found.
    ///
    /// # Examples
    ///
    /// ```
    /// use fr_core::{Config, FileSpec};
    /// use fr_resource::{AnyResource, Resource};
    ///
    /// let config = Config {
    ///     resources: vec![FileSpec::new("motd", "/etc/motd")],
    ///     ..Config::default()
    /// };
    /// let resources = AnyResource::from_config(&config)?;
    /// assert_eq!(resources[0].name(), "motd");
    /// # Ok::<(), fr_resource::ResourceError>(())
    /// ```
    pub fn from_config(config: &Config) -> Result<Vec<Self>, ResourceError> {
        config
            .resources
            .iter()
            .map(|spec| {
                let resource = FileResource::new(spec.clone())
                    .with_watch_config(config.watch)
                    .with_dir_check(config.sync.dir_check);
                resource.validate()?;
                Ok(Self::File(resource))
            })
            .collect()
    }
}

impl From<FileResource> for AnyResource {
    fn from(resource: FileResource) -> Self {
        Self::File(resource)
    }
}

impl Resource for AnyResource {
    fn name(&self) -> &str {
        match self {
            Self::File(r) => r.name(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::File(r) => Resource::kind(r),
        }
    }

    fn validate(&self) -> Result<(), ResourceError> {
        match self {
            Self::File(r) => r.validate(),
        }
    }

    fn watch(&self, ctx: WatchContext) -> impl Future<Output = Result<(), WatchError>> + Send {
        match self {
            Self::File(r) => r.watch(ctx),
        }
    }

    fn check_apply(&self, apply: bool) -> Result<bool, ResourceError> {
        match self {
            Self::File(r) => r.check_apply(apply),
        }
    }

    fn uuids(&self) -> Vec<ResourceUuid> {
        match self {
            Self::File(r) => r.uuids(),
        }
    }

    fn group_cmp(&self, other: &Self) -> bool {
        match self {
            Self::File(r) => Resource::group_cmp(r, other),
        }
    }

    fn compare(&self, other: &Self) -> bool {
        match self {
            Self::File(r) => Resource::compare(r, other),
        }
    }

    fn auto_edges(&self) -> Box<dyn AutoEdge> {
        match self {
            Self::File(r) => Resource::auto_edges(r),
        }
    }
}
