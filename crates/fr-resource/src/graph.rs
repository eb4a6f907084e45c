//! Edge resolution and apply ordering.
//!
//! [`resolve_auto_edges`] runs every resource's auto-edge generator against
//! the identities of all the others. [`apply_order`] then sorts resources so
//! every edge's source comes before its target.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::error::ResourceError;
use crate::resource::{AnyResource, Resource};

/// A dependency: `before` must be converged before `after`.
///
/// Both fields index into the resource slice the edge was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Index of the dependency.
    pub before: usize,
    /// Index of the dependent resource.
    pub after: usize,
}

/// Resolves implicit edges between `resources`.
///
/// Each resource offers candidate identities one at a time; every other
/// resource with an equivalent identity becomes a dependency. The generator
/// decides when to stop. Reversed identities produce edges pointing at the
/// generating resource.
///
/// # Examples
///
/// ```
/// use fr_core::FileSpec;
/// use fr_resource::{AnyResource, FileResource, resolve_auto_edges};
///
/// let resources: Vec<AnyResource> = vec![
///     FileResource::new(FileSpec::new("index", "/srv/www/index.html")).into(),
///     FileResource::new(FileSpec::new("www", "/srv/www/")).into(),
/// ];
/// let edges = resolve_auto_edges(&resources);
/// assert_eq!(edges.len(), 1);
/// assert_eq!((edges[0].before, edges[0].after), (1, 0));
/// ```
#[must_use]
pub fn resolve_auto_edges(resources: &[AnyResource]) -> Vec<Edge> {
    let identities: Vec<_> = resources.iter().map(Resource::uuids).collect();
    let mut edges = Vec::new();
    let mut seen = FxHashSet::default();

    for (index, resource) in resources.iter().enumerate() {
        let mut generator = resource.auto_edges();
        while let Some(candidate) = generator.next() {
            let mut found = false;
            for (other, uuids) in identities.iter().enumerate() {
                if other == index || !uuids.iter().any(|uuid| uuid.iff(&candidate)) {
                    continue;
                }
                found = true;
                let edge = if candidate.is_reversed() {
                    Edge {
                        before: other,
                        after: index,
                    }
                } else {
                    Edge {
                        before: index,
                        after: other,
                    }
                };
                if seen.insert(edge) {
                    debug!(
                        before = %resources[edge.before].name(),
                        after = %resources[edge.after].name(),
                        "Auto-edge"
                    );
                    edges.push(edge);
                }
            }
            if !generator.test(found) {
                break;
            }
        }
    }

    edges
}

/// Orders `resources` so that every edge's `before` precedes its `after`.
///
/// Ties keep configuration order.
///
/// # Errors
///
/// Returns [`ResourceError::Cycle`] naming the resources that could not be
/// ordered.
pub fn apply_order(resources: &[AnyResource], edges: &[Edge]) -> Result<Vec<usize>, ResourceError> {
    let count = resources.len();
    let mut indegree = vec![0_usize; count];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];

    for edge in edges {
        indegree[edge.after] += 1;
        dependents[edge.before].push(edge.after);
    }

    let mut ready: VecDeque<usize> = (0..count).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(count);

    while let Some(index) = ready.pop_front() {
        order.push(index);
        for &next in &dependents[index] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() < count {
        let resources = (0..count)
            .filter(|&i| indegree[i] > 0)
            .map(|i| resources[i].name().to_owned())
            .collect();
        return Err(ResourceError::Cycle { resources });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileResource;
    use fr_core::FileSpec;

    fn graph(paths: &[(&str, &str)]) -> Vec<AnyResource> {
        paths
            .iter()
            .map(|(name, path)| FileResource::new(FileSpec::new(*name, *path)).into())
            .collect()
    }

    fn names(resources: &[AnyResource], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| resources[i].name().to_owned()).collect()
    }

    #[test]
    fn test_nearest_directory_only() {
        let resources = graph(&[
            ("file", "/a/b/c/d"),
            ("a", "/a/"),
            ("ab", "/a/b/"),
        ]);
        let edges = resolve_auto_edges(&resources);
        assert!(edges.contains(&Edge { before: 2, after: 0 }));
        assert!(!edges.contains(&Edge { before: 1, after: 0 }));
        // /a/b/ itself depends on /a/
        assert!(edges.contains(&Edge { before: 1, after: 2 }));
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn test_apply_order_parents_first() {
        let resources = graph(&[
            ("index", "/srv/www/index.html"),
            ("www", "/srv/www/"),
            ("srv", "/srv/"),
            ("motd", "/etc/motd"),
        ]);
        let edges = resolve_auto_edges(&resources);
        let order = apply_order(&resources, &edges).expect("graph is acyclic");
        assert_eq!(names(&resources, &order), ["srv", "motd", "www", "index"]);
    }

    #[test]
    fn test_no_edges_keeps_config_order() {
        let resources = graph(&[("b", "/etc/b"), ("a", "/etc/a")]);
        let edges = resolve_auto_edges(&resources);
        assert!(edges.is_empty());
        let order = apply_order(&resources, &edges).expect("graph is acyclic");
        assert_eq!(order, [0, 1]);
    }

    #[test]
    fn test_cycle_detected() {
        let resources = graph(&[("x", "/x"), ("y", "/y"), ("z", "/z")]);
        let edges = [
            Edge { before: 0, after: 1 },
            Edge { before: 1, after: 0 },
        ];
        let err = apply_order(&resources, &edges).expect_err("cycle");
        assert!(matches!(&err, ResourceError::Cycle { resources } if resources == &["x", "y"]));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_same_path_is_not_self_edge() {
        let resources = graph(&[("one", "/srv/www/"), ("two", "/srv/www/")]);
        assert!(resolve_auto_edges(&resources).is_empty());
    }
}
