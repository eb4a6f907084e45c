//! Two-pass directory synchronization.
//!
//! [`DirectorySynchronizer`] makes a destination tree mirror a source tree.
//!
//! The first pass walks the destination. Entries with no source counterpart,
//! or of a different kind, are removed (a removed directory is not descended
//! into). Files whose digests differ are rewritten and links whose targets
//! differ are re-pointed. Every destination entry left in agreement with the
//! source is recorded in a seen map keyed by relative path.
//!
//! The second pass walks the source and creates whatever the seen map does
//! not contain. Directories are created with the source mode before their
//! contents are visited.
//!
//! Neither pass is atomic. A failed entry is logged and skipped, the pass
//! carries on, and the call reports [`SyncError::Incomplete`]. Running apply
//! again repairs whatever was left behind.
//!
//! Sockets, pipes and devices are never copied or removed. One in the source
//! is not expected at the destination. One in the destination stays where it
//! is and shadows whatever the source has at that path, including a whole
//! subtree; both apply and check skip it.

use std::fs;
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

use camino::{Utf8Path, Utf8PathBuf};
use fr_core::DirCheckMode;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::digest::digest_file;
use crate::error::SyncError;
use crate::stats::{SyncReport, SyncStats};
use crate::walker::{EntryKind, TreeEntry, TreeWalker};

/// Mirrors a source directory into a destination directory.
///
/// # Examples
///
/// ```no_run
/// use fr_core::DirCheckMode;
/// use fr_sync::DirectorySynchronizer;
///
/// let sync = DirectorySynchronizer::new("/srv/skel", "/srv/www");
/// if !sync.check(DirCheckMode::Probe)? {
///     let report = sync.apply()?;
///     println!("{} changes", report.changed());
/// }
/// # Ok::<(), fr_sync::SyncError>(())
/// ```
#[derive(Debug)]
pub struct DirectorySynchronizer {
    source: Utf8PathBuf,
    dest: Utf8PathBuf,
    stats: SyncStats,
}

impl DirectorySynchronizer {
    /// Creates a synchronizer from `source` to `dest`.
    pub fn new(source: impl Into<Utf8PathBuf>, dest: impl Into<Utf8PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            stats: SyncStats::new(),
        }
    }

    /// Returns the source root.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &Utf8Path {
        &self.source
    }

    /// Returns the destination root.
    #[inline]
    #[must_use]
    pub fn dest(&self) -> &Utf8Path {
        &self.dest
    }

    /// Returns the counters of the last apply pass.
    #[must_use]
    pub fn report(&self) -> SyncReport {
        self.stats.snapshot()
    }

    /// Read-only comparison of destination against source.
    ///
    /// In [`DirCheckMode::Probe`] only source-derived paths are inspected, so
    /// extra destination entries go unnoticed. [`DirCheckMode::Strict`] also
    /// walks the destination and fails on any entry the source lacks.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidSource`] if the source is unusable and any
    /// walk or I/O error encountered on the way.
    pub fn check(&self, mode: DirCheckMode) -> Result<bool, SyncError> {
        self.validate_source()?;

        match fs::symlink_metadata(&self.dest) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(SyncError::io(&self.dest, e)),
        }

        let mut walker = TreeWalker::new(&self.source);
        while let Some(entry) = walker.next() {
            let entry = entry?;
            match self.probe(&entry)? {
                Verdict::Matches => {}
                Verdict::Shadowed => {
                    if entry.kind == EntryKind::Dir {
                        walker.skip_current_dir();
                    }
                }
                Verdict::Differs => {
                    debug!(path = %entry.rel, dest = %self.dest, "Destination differs from source");
                    return Ok(false);
                }
            }
        }

        if mode == DirCheckMode::Strict {
            for entry in TreeWalker::new(&self.dest) {
                let entry = entry?;
                if entry.kind == EntryKind::Other {
                    continue;
                }
                if lstat_kind(&self.source.join(&entry.rel))?.is_none() {
                    debug!(path = %entry.rel, dest = %self.dest, "Extra destination entry");
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    /// Makes the destination mirror the source.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidSource`] before touching anything if the
    /// source is unusable, and [`SyncError::Incomplete`] after both passes
    /// if any entry failed.
    pub fn apply(&self) -> Result<SyncReport, SyncError> {
        let source_meta = self.validate_source()?;
        self.stats.reset();

        match fs::symlink_metadata(&self.dest) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::DirBuilder::new()
                    .recursive(true)
                    .mode(source_meta.permissions().mode())
                    .create(&self.dest)
                    .map_err(|e| SyncError::io(&self.dest, e))?;
                self.stats.increment_dirs_created();
            }
            Err(e) => return Err(SyncError::io(&self.dest, e)),
        }

        let seen = self.reconcile_dest();
        self.populate_from_source(&seen);

        let report = self.stats.snapshot();
        info!(
            source = %self.source,
            dest = %self.dest,
            copied = report.files_copied,
            links = report.links_replaced,
            removed = report.entries_removed,
            created = report.dirs_created,
            unsupported = report.unsupported_skipped,
            failures = report.failures,
            "Directory synchronized"
        );

        if report.failures > 0 {
            return Err(SyncError::Incomplete {
                failed: report.failures,
                path: self.dest.clone(),
            });
        }
        Ok(report)
    }

    /// Pass 1: walk the destination, removing and repairing entries.
    ///
    /// Returns the entries left in place, keyed by relative path, with their
    /// destination kind.
    fn reconcile_dest(&self) -> FxHashMap<Utf8PathBuf, EntryKind> {
        let mut seen = FxHashMap::default();
        let mut walker = TreeWalker::new(&self.dest);

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.record_failure(&err);
                    continue;
                }
            };

            if entry.kind == EntryKind::Other {
                warn!(path = %entry.path, "Skipping unsupported destination entry");
                self.stats.increment_unsupported();
                seen.insert(entry.rel, EntryKind::Other);
                continue;
            }

            let src = self.source.join(&entry.rel);
            let src_kind = match lstat_kind(&src) {
                Ok(kind) => kind,
                Err(err) => {
                    self.record_failure(&err);
                    continue;
                }
            };

            match src_kind {
                Some(kind) if kind == entry.kind => {
                    let result = match kind {
                        EntryKind::File => self.sync_file(&src, &entry.path),
                        EntryKind::Symlink => self.sync_link(&src, &entry.path),
                        EntryKind::Dir | EntryKind::Other => Ok(()),
                    };
                    match result {
                        Ok(()) => {
                            seen.insert(entry.rel, kind);
                        }
                        Err(err) => self.record_failure(&err),
                    }
                }
                other => {
                    debug!(
                        path = %entry.path,
                        found = entry.kind.label(),
                        expected = other.map_or("nothing", EntryKind::label),
                        "Removing destination entry"
                    );
                    if entry.kind == EntryKind::Dir {
                        walker.skip_current_dir();
                    }
                    match remove_entry(&entry) {
                        Ok(()) => self.stats.increment_entries_removed(),
                        Err(err) => self.record_failure(&err),
                    }
                }
            }
        }

        seen
    }

    /// Pass 2: walk the source, creating everything the destination lacks.
    fn populate_from_source(&self, seen: &FxHashMap<Utf8PathBuf, EntryKind>) {
        let mut walker = TreeWalker::new(&self.source);

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.record_failure(&err);
                    continue;
                }
            };
            if let Some(&found) = seen.get(&entry.rel) {
                if entry.kind == EntryKind::Dir && found != EntryKind::Dir {
                    debug!(path = %entry.rel, found = found.label(), "Source directory shadowed, skipping");
                    walker.skip_current_dir();
                }
                continue;
            }

            let dst = self.dest.join(&entry.rel);
            let result = match entry.kind {
                EntryKind::Dir => {
                    let created = create_dir_like(&entry.path, &dst);
                    if created.is_err() {
                        walker.skip_current_dir();
                    } else {
                        self.stats.increment_dirs_created();
                    }
                    created
                }
                EntryKind::File => copy_file(&entry.path, &dst).map(|()| self.stats.increment_files_copied()),
                EntryKind::Symlink => {
                    copy_link(&entry.path, &dst).map(|()| self.stats.increment_links_replaced())
                }
                EntryKind::Other => {
                    warn!(path = %entry.path, "Skipping unsupported source entry");
                    self.stats.increment_unsupported();
                    Ok(())
                }
            };

            if let Err(err) = result {
                self.record_failure(&err);
            }
        }
    }

    fn sync_file(&self, src: &Utf8Path, dst: &Utf8Path) -> Result<(), SyncError> {
        if digest_file(src)? == digest_file(dst)? {
            return Ok(());
        }
        copy_file(src, dst)?;
        self.stats.increment_files_copied();
        Ok(())
    }

    fn sync_link(&self, src: &Utf8Path, dst: &Utf8Path) -> Result<(), SyncError> {
        let want = fs::read_link(src).map_err(|e| SyncError::io(src, e))?;
        let have = fs::read_link(dst).map_err(|e| SyncError::io(dst, e))?;
        if want == have {
            return Ok(());
        }
        fs::remove_file(dst).map_err(|e| SyncError::io(dst, e))?;
        std::os::unix::fs::symlink(&want, dst).map_err(|e| SyncError::io(dst, e))?;
        self.stats.increment_links_replaced();
        Ok(())
    }

    /// Compares one source entry with its destination counterpart.
    fn probe(&self, entry: &TreeEntry) -> Result<Verdict, SyncError> {
        if entry.kind == EntryKind::Other {
            return Ok(Verdict::Matches);
        }
        let dst = self.dest.join(&entry.rel);
        let Some(dest_kind) = lstat_kind(&dst)? else {
            return Ok(Verdict::Differs);
        };
        if dest_kind == EntryKind::Other {
            return Ok(Verdict::Shadowed);
        }
        if dest_kind != entry.kind {
            return Ok(Verdict::Differs);
        }

        let same = match entry.kind {
            EntryKind::Dir | EntryKind::Other => true,
            EntryKind::Symlink => {
                let want = fs::read_link(&entry.path).map_err(|e| SyncError::io(&entry.path, e))?;
                let have = fs::read_link(&dst).map_err(|e| SyncError::io(&dst, e))?;
                want == have
            }
            EntryKind::File => digest_file(&entry.path)? == digest_file(&dst)?,
        };
        Ok(if same { Verdict::Matches } else { Verdict::Differs })
    }

    fn validate_source(&self) -> Result<fs::Metadata, SyncError> {
        match fs::metadata(&self.source) {
            Ok(meta) if meta.is_dir() => Ok(meta),
            Ok(_) => Err(SyncError::InvalidSource {
                path: self.source.clone(),
                reason: "not a directory",
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SyncError::InvalidSource {
                path: self.source.clone(),
                reason: "does not exist",
            }),
            Err(e) => Err(SyncError::io(&self.source, e)),
        }
    }

    fn record_failure(&self, err: &SyncError) {
        warn!(error = %err, dest = %self.dest, "Failed to synchronize entry");
        self.stats.increment_failures();
    }
}

/// Result of comparing one source entry against the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Matches,
    Differs,
    /// An unsupported destination entry occupies the path.
    Shadowed,
}

/// `lstat` reduced to an [`EntryKind`]; `None` when the path does not exist.
fn lstat_kind(path: &Utf8Path) -> Result<Option<EntryKind>, SyncError> {
    match fs::symlink_metadata(path) {
        Ok(meta) => Ok(Some(EntryKind::from(meta.file_type()))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SyncError::io(path, e)),
    }
}

fn remove_entry(entry: &TreeEntry) -> Result<(), SyncError> {
    let result = if entry.kind == EntryKind::Dir {
        fs::remove_dir_all(&entry.path)
    } else {
        fs::remove_file(&entry.path)
    };
    result.map_err(|e| SyncError::io(&entry.path, e))
}

fn create_dir_like(src: &Utf8Path, dst: &Utf8Path) -> Result<(), SyncError> {
    let meta = fs::symlink_metadata(src).map_err(|e| SyncError::io(src, e))?;
    fs::DirBuilder::new()
        .mode(meta.permissions().mode())
        .create(dst)
        .map_err(|e| SyncError::io(dst, e))
}

fn copy_file(src: &Utf8Path, dst: &Utf8Path) -> Result<(), SyncError> {
    fs::copy(src, dst).map(drop).map_err(|e| SyncError::io(dst, e))
}

fn copy_link(src: &Utf8Path, dst: &Utf8Path) -> Result<(), SyncError> {
    let target = fs::read_link(src).map_err(|e| SyncError::io(src, e))?;
    std::os::unix::fs::symlink(target, dst).map_err(|e| SyncError::io(dst, e))
}
