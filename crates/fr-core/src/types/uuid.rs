//! Resource identity used for graph deduplication and auto-edges.

use camino::{Utf8Path, Utf8PathBuf};

/// Identity of a resource as seen by the graph.
///
/// Two identities are equivalent when [`iff`](Self::iff) holds: same kind and
/// same path. Path comparison is component-wise, so `/srv/www/` and `/srv/www`
/// are the same identity.
///
/// `reversed` marks identities produced by an auto-edge generator: the edge
/// runs from the matched resource to the generating one, not the other way.
///
/// # Examples
///
/// ```
/// use fr_core::ResourceUuid;
///
/// let dir = ResourceUuid::new("file", "www", "/srv/www/");
/// let probe = ResourceUuid::new("file", "index", "/srv/www").reversed();
/// assert!(dir.iff(&probe));
/// assert!(probe.is_reversed());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceUuid {
    kind: &'static str,
    name: String,
    path: Utf8PathBuf,
    reversed: bool,
}

impl ResourceUuid {
    /// Creates a forward identity.
    #[must_use]
    pub fn new(kind: &'static str, name: impl Into<String>, path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            kind,
            name: name.into(),
            path: path.into(),
            reversed: false,
        }
    }

    /// Marks the identity as the far end of a reversed edge.
    #[must_use]
    pub const fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    /// Returns `true` if both identities name the same kind and path.
    #[inline]
    #[must_use]
    pub fn iff(&self, other: &Self) -> bool {
        self.kind == other.kind && self.path == other.path
    }

    /// Resource kind, e.g. `"file"`.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// Name of the resource that produced this identity.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identifying path, as produced (trailing `/` preserved).
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Whether this identity is the far end of a reversed edge.
    #[inline]
    #[must_use]
    pub const fn is_reversed(&self) -> bool {
        self.reversed
    }
}
