//! The desired-state record of a file resource.

use serde::{Deserialize, Serialize};

use super::state::ResourceState;

/// Desired state of one managed file or directory, as written in configuration.
///
/// `path`, `dirname` and `basename` together resolve to the effective path;
/// the resolution rules live with the resource that owns this record. A path
/// ending in `/` names a directory.
///
/// For a file, `content` is the literal file body. For a directory, it is the
/// path of a source tree to mirror, and an empty `content` only requires the
/// directory to exist.
///
/// # Examples
///
/// ```
/// use fr_core::{FileSpec, ResourceState};
///
/// let spec = FileSpec::new("motd", "/etc/motd").with_content("welcome\n");
/// assert_eq!(spec.state, ResourceState::Present);
/// assert_eq!(spec.content, "welcome\n");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSpec {
    /// Unique name within the resource graph.
    pub name: String,

    /// Raw path of the managed file or directory.
    pub path: String,

    /// Optional directory override; must end with `/` when set.
    pub dirname: String,

    /// Optional base name override; must not start with `/` when set.
    pub basename: String,

    /// File body, or source directory for a directory resource.
    pub content: String,

    /// Whether the path should exist.
    pub state: ResourceState,
}

impl FileSpec {
    /// Creates a spec for `path` with empty content and [`ResourceState::Present`].
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Sets the desired content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Sets the desired state.
    #[must_use]
    pub const fn with_state(mut self, state: ResourceState) -> Self {
        self.state = state;
        self
    }

    /// Sets the dirname override.
    #[must_use]
    pub fn with_dirname(mut self, dirname: impl Into<String>) -> Self {
        self.dirname = dirname.into();
        self
    }

    /// Sets the basename override.
    #[must_use]
    pub fn with_basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = basename.into();
        self
    }
}
