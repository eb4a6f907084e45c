//! Tree traversal for synchronization.
//!
//! This module provides [`TreeWalker`], a thin layer over `walkdir` that
//! yields [`TreeEntry`] values with UTF-8 paths relative to the walk root and
//! a coarse [`EntryKind`].
//!
//! Symbolic links are never followed. Entries within a directory are visited
//! in file-name order, and a directory is always yielded before its contents,
//! so [`TreeWalker::skip_current_dir`] can prune a subtree that was just
//! removed.

use std::fs::FileType;

use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

use crate::error::SyncError;

/// Kind of a filesystem entry, as far as synchronization cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
    /// Symbolic link (not followed).
    Symlink,
    /// Sockets, pipes, devices. Never copied or removed.
    Other,
}

impl EntryKind {
    /// Returns a short label for logging.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dir => "directory",
            Self::Symlink => "symlink",
            Self::Other => "unsupported",
        }
    }
}

impl From<FileType> for EntryKind {
    fn from(ft: FileType) -> Self {
        if ft.is_symlink() {
            Self::Symlink
        } else if ft.is_dir() {
            Self::Dir
        } else if ft.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

/// A single entry found below the walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Full path of the entry.
    pub path: Utf8PathBuf,
    /// Path relative to the walk root.
    pub rel: Utf8PathBuf,
    /// Entry kind, from `lstat`.
    pub kind: EntryKind,
}

/// Depth-first walker over everything below a root directory.
///
/// The root itself is not yielded.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use fr_sync::TreeWalker;
///
/// for entry in TreeWalker::new(Utf8Path::new("/srv/www")) {
///     let entry = entry?;
///     println!("{} ({})", entry.rel, entry.kind.label());
/// }
/// # Ok::<(), fr_sync::SyncError>(())
/// ```
pub struct TreeWalker {
    root: Utf8PathBuf,
    inner: walkdir::IntoIter,
}

impl TreeWalker {
    /// Creates a walker rooted at `root`.
    #[must_use]
    pub fn new(root: &Utf8Path) -> Self {
        let inner = WalkDir::new(root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();
        Self {
            root: root.to_owned(),
            inner,
        }
    }

    /// Stops the walk from descending into the directory just yielded.
    #[inline]
    pub fn skip_current_dir(&mut self) {
        self.inner.skip_current_dir();
    }

    fn convert(&self, entry: &walkdir::DirEntry) -> Result<TreeEntry, SyncError> {
        let path = Utf8Path::from_path(entry.path())
            .ok_or_else(|| SyncError::NonUtf8Path(entry.path().to_owned()))?;
        let rel = path.strip_prefix(&self.root).unwrap_or(path);

        Ok(TreeEntry {
            path: path.to_owned(),
            rel: rel.to_owned(),
            kind: EntryKind::from(entry.file_type()),
        })
    }
}

impl Iterator for TreeWalker {
    type Item = Result<TreeEntry, SyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next()? {
            Ok(entry) => Some(self.convert(&entry)),
            Err(err) => Some(Err(err.into())),
        }
    }
}

impl std::fmt::Debug for TreeWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWalker").field("root", &self.root).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("Invalid path");
        (dir, root)
    }

    fn collect(walker: TreeWalker) -> Vec<(String, EntryKind)> {
        walker
            .map(|e| e.expect("walk should succeed"))
            .map(|e| (e.rel.to_string(), e.kind))
            .collect()
    }

    #[test]
    fn test_walk_order_and_kinds() {
        let (_dir, root) = temp_root();
        std::fs::create_dir_all(root.join("b/c")).expect("mkdir");
        std::fs::write(root.join("a.txt"), "a").expect("write");
        std::fs::write(root.join("b/c/d.txt"), "d").expect("write");
        std::os::unix::fs::symlink("a.txt", root.join("link")).expect("symlink");

        let entries = collect(TreeWalker::new(&root));
        assert_eq!(
            entries,
            vec![
                ("a.txt".to_owned(), EntryKind::File),
                ("b".to_owned(), EntryKind::Dir),
                ("b/c".to_owned(), EntryKind::Dir),
                ("b/c/d.txt".to_owned(), EntryKind::File),
                ("link".to_owned(), EntryKind::Symlink),
            ]
        );
    }

    #[test]
    fn test_skip_current_dir() {
        let (_dir, root) = temp_root();
        std::fs::create_dir_all(root.join("skip/inner")).expect("mkdir");
        std::fs::write(root.join("z.txt"), "z").expect("write");

        let mut walker = TreeWalker::new(&root);
        let mut seen = Vec::new();
        while let Some(entry) = walker.next() {
            let entry = entry.expect("walk should succeed");
            if entry.rel == "skip" {
                walker.skip_current_dir();
            }
            seen.push(entry.rel.to_string());
        }
        assert_eq!(seen, vec!["skip", "z.txt"]);
    }

    #[test]
    fn test_symlinked_dir_not_followed() {
        let (_dir, root) = temp_root();
        std::fs::create_dir_all(root.join("real")).expect("mkdir");
        std::fs::write(root.join("real/f"), "f").expect("write");
        std::os::unix::fs::symlink("real", root.join("alias")).expect("symlink");

        let entries = collect(TreeWalker::new(&root));
        assert!(entries.contains(&("alias".to_owned(), EntryKind::Symlink)));
        assert!(!entries.iter().any(|(rel, _)| rel == "alias/f"));
    }

    #[test]
    fn test_missing_root_yields_error() {
        let (_dir, root) = temp_root();
        let mut walker = TreeWalker::new(&root.join("missing"));
        assert!(matches!(walker.next(), Some(Err(SyncError::Walk(_)))));
    }
}
