//! Implicit dependencies derived from resource paths.
//!
//! A file resource depends on whichever managed directory most closely
//! contains it. The generator offers ancestor identities one at a time,
//! nearest first, and the graph builder reports back whether each one
//! matched a managed resource. The first match ends the sequence, so a file
//! under `/srv/www/` gets an edge from `/srv/www/` but not from `/srv/` too.

use fr_core::{ResourceUuid, paths};

/// Producer side of the auto-edge protocol.
///
/// The consumer alternates [`next`](Self::next) and [`test`](Self::test):
///
/// ```text
/// loop {
///     uuid  = next()          // None ⇒ done
///     found = lookup(uuid)
///     if !test(found) { break }
/// }
/// ```
pub trait AutoEdge: Send {
    /// Next candidate identity, or `None` once the sequence is finished.
    fn next(&mut self) -> Option<ResourceUuid>;

    /// Reports whether the last candidate matched a resource. Returns `true`
    /// if the consumer should keep asking.
    fn test(&mut self, found: bool) -> bool;
}

/// Ancestor directories of a file resource, nearest first.
///
/// # Examples
///
/// ```
/// use fr_resource::{AutoEdge, FileAutoEdges};
///
/// let mut edges = FileAutoEdges::new("index", "/srv/www/index.html");
/// assert_eq!(edges.next().map(|u| u.path().to_string()), Some("/srv/www/".to_owned()));
/// assert!(edges.test(false));
/// assert_eq!(edges.next().map(|u| u.path().to_string()), Some("/srv/".to_owned()));
/// assert!(!edges.test(true));
/// assert!(edges.next().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct FileAutoEdges {
    candidates: Vec<ResourceUuid>,
    pointer: usize,
    found: bool,
}

impl FileAutoEdges {
    /// Builds the candidate list for the resource `name` at `path`.
    ///
    /// Every candidate is a reversed `file` identity: the matched directory
    /// must be applied before the resource that generated it.
    #[must_use]
    pub fn new(name: &str, path: &str) -> Self {
        let candidates = paths::parent_dirs(path)
            .into_iter()
            .map(|dir| ResourceUuid::new(crate::file::KIND, name, dir).reversed())
            .collect();
        Self {
            candidates,
            pointer: 0,
            found: false,
        }
    }

    /// Number of candidates not yet offered.
    #[must_use]
    pub fn remaining(&self) -> usize {
        if self.found {
            0
        } else {
            self.candidates.len() - self.pointer
        }
    }
}

impl AutoEdge for FileAutoEdges {
    fn next(&mut self) -> Option<ResourceUuid> {
        if self.found {
            return None;
        }
        let uuid = self.candidates.get(self.pointer).cloned()?;
        self.pointer += 1;
        Some(uuid)
    }

    fn test(&mut self, found: bool) -> bool {
        if found {
            self.found = true;
            return false;
        }
        self.pointer < self.candidates.len()
    }
}
