//! Path arithmetic for managed paths.
//!
//! Managed paths are plain strings in configuration, where a trailing `/`
//! carries meaning (it marks a directory). The helpers here work on those
//! strings for resolution and on [`Utf8Path`] components for depth
//! calculations, which the watch loop relies on to move its anchor.
//!
//! Depth counts the root as one segment: `/` has depth 1, `/tmp/x` depth 3.
//!
//! # Examples
//!
//! ```
//! use camino::Utf8Path;
//! use fr_core::paths;
//!
//! assert_eq!(paths::depth(Utf8Path::new("/tmp/x")), 3);
//! assert_eq!(paths::prefix_delta(Utf8Path::new("/tmp/x/f"), Utf8Path::new("/tmp")), Some(2));
//! assert_eq!(paths::parent_dirs("/a/b/c"), vec!["/a/b/", "/a/", "/"]);
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use smallvec::SmallVec;

/// Path segments, inline for paths up to eight components deep.
pub type Segments = SmallVec<[String; 8]>;

/// Returns `true` if the configured path names a directory.
#[inline]
#[must_use]
pub fn is_dir_path(path: &str) -> bool {
    path.ends_with('/')
}

/// Splits a path into its components, keeping the root as `/`.
///
/// ```
/// use camino::Utf8Path;
/// use fr_core::paths::segments;
///
/// assert_eq!(segments(Utf8Path::new("/tmp/x/")).as_slice(), ["/", "tmp", "x"]);
/// ```
#[must_use]
pub fn segments(path: &Utf8Path) -> Segments {
    path.components().map(|c| c.as_str().to_owned()).collect()
}

/// Joins segments produced by [`segments`] back into a path.
#[must_use]
pub fn join_segments(segments: &[String]) -> Utf8PathBuf {
    let mut path = Utf8PathBuf::new();
    for segment in segments {
        path.push(segment);
    }
    path
}

/// Normalizes a path: drops trailing separators, repeated separators and
/// interior `.` components.
///
/// ```
/// use fr_core::paths::clean;
///
/// assert_eq!(clean("/srv//www/"), "/srv/www");
/// assert_eq!(clean("/"), "/");
/// ```
#[must_use]
pub fn clean(path: &str) -> Utf8PathBuf {
    join_segments(&segments(Utf8Path::new(path)))
}

/// Number of components in `path`, root included.
#[inline]
#[must_use]
pub fn depth(path: &Utf8Path) -> usize {
    path.components().count()
}

/// Returns `true` if `prefix` is `path` or one of its ancestors.
///
/// Comparison is per component, so `/tmp/ab` does not start with `/tmp/a`.
#[inline]
#[must_use]
pub fn has_path_prefix(path: &Utf8Path, prefix: &Utf8Path) -> bool {
    path.starts_with(prefix)
}

/// How many components `path` extends beyond `prefix`, or `None` if
/// `prefix` is not a prefix of `path`.
#[must_use]
pub fn prefix_delta(path: &Utf8Path, prefix: &Utf8Path) -> Option<usize> {
    if has_path_prefix(path, prefix) {
        Some(depth(path) - depth(prefix))
    } else {
        None
    }
}

/// Directory part of a configured path, keeping its trailing `/`.
///
/// ```
/// use fr_core::paths::dirname;
///
/// assert_eq!(dirname("/etc/motd"), "/etc/");
/// assert_eq!(dirname("/srv/www/"), "/srv/");
/// assert_eq!(dirname("motd"), "");
/// ```
#[must_use]
pub fn dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[..=idx],
        None => "",
    }
}

/// Final component of a configured path; directories keep their trailing `/`.
///
/// ```
/// use fr_core::paths::basename;
///
/// assert_eq!(basename("/etc/motd"), "motd");
/// assert_eq!(basename("/srv/www/"), "www/");
/// ```
#[must_use]
pub fn basename(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return path.to_owned();
    }
    let base = trimmed.rfind('/').map_or(trimmed, |idx| &trimmed[idx + 1..]);
    if is_dir_path(path) {
        format!("{base}/")
    } else {
        base.to_owned()
    }
}

/// Every ancestor directory of `path`, nearest first, each with a trailing
/// `/`, ending at the root. The path itself is not included.
#[must_use]
pub fn parent_dirs(path: &str) -> Vec<String> {
    let cleaned = clean(path);
    cleaned
        .ancestors()
        .skip(1)
        .map(|ancestor| {
            let s = ancestor.as_str();
            if s.ends_with('/') {
                s.to_owned()
            } else {
                format!("{s}/")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_and_join() {
        let segs = segments(Utf8Path::new("/tmp/x/f.txt"));
        assert_eq!(segs.as_slice(), ["/", "tmp", "x", "f.txt"]);
        assert_eq!(join_segments(&segs[..1]), "/");
        assert_eq!(join_segments(&segs[..3]), "/tmp/x");
        assert_eq!(join_segments(&segs), "/tmp/x/f.txt");
    }

    #[test]
    fn test_depth() {
        assert_eq!(depth(Utf8Path::new("/")), 1);
        assert_eq!(depth(Utf8Path::new("/tmp")), 2);
        assert_eq!(depth(Utf8Path::new("/tmp/x/")), 3);
    }

    #[test]
    fn test_has_path_prefix_is_per_component() {
        assert!(has_path_prefix(Utf8Path::new("/tmp/a/b"), Utf8Path::new("/tmp/a")));
        assert!(has_path_prefix(Utf8Path::new("/tmp/a"), Utf8Path::new("/tmp/a")));
        assert!(!has_path_prefix(Utf8Path::new("/tmp/ab"), Utf8Path::new("/tmp/a")));
        assert!(!has_path_prefix(Utf8Path::new("/tmp"), Utf8Path::new("/tmp/a")));
    }

    #[test]
    fn test_prefix_delta() {
        assert_eq!(prefix_delta(Utf8Path::new("/a/b/c"), Utf8Path::new("/a")), Some(2));
        assert_eq!(prefix_delta(Utf8Path::new("/a"), Utf8Path::new("/a")), Some(0));
        assert_eq!(prefix_delta(Utf8Path::new("/a"), Utf8Path::new("/a/b")), None);
    }

    #[test]
    fn test_dirname_and_basename() {
        assert_eq!(dirname("/a/b/c"), "/a/b/");
        assert_eq!(dirname("/a/b/"), "/a/");
        assert_eq!(dirname("/a"), "/");
        assert_eq!(basename("/a/b/c"), "c");
        assert_eq!(basename("/a/b/"), "b/");
        assert_eq!(basename("/"), "/");
    }

    #[test]
    fn test_parent_dirs() {
        assert_eq!(parent_dirs("/a/b/c/d"), vec!["/a/b/c/", "/a/b/", "/a/", "/"]);
        assert_eq!(parent_dirs("/a/b/"), vec!["/a/", "/"]);
        assert!(parent_dirs("/").is_empty());
    }

    #[test]
    fn test_is_dir_path() {
        assert!(is_dir_path("/srv/www/"));
        assert!(!is_dir_path("/srv/www"));
    }
}
