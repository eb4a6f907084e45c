//! The `file` resource.
//!
//! A [`FileResource`] manages one path. A path ending in `/` is a directory
//! resource, anything else is a regular file.
//!
//! | state   | kind      | content      | converged when                          |
//! |---------|-----------|--------------|-----------------------------------------|
//! | absent  | any       | ignored      | nothing exists at the path              |
//! | present | file      | literal text | the file's SHA-256 equals the content's |
//! | present | directory | empty        | the directory exists                    |
//! | present | directory | source path  | the directory mirrors the source tree   |
//!
//! # Cached state
//!
//! Two fields are cached for the lifetime of the process:
//!
//! - the digest of `content`, computed on first use and never invalidated;
//! - the converged flag. Only [`FileResource::check_apply`] sets it and only
//!   the watch loop clears it. Each side writes in one direction, so a plain
//!   atomic is enough.

use std::fs;
use std::io;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use fr_core::{ConfigError, DirCheckMode, FileSpec, ResourceUuid, WatchConfig, paths};
use fr_sync::{ContentDigest, DirectorySynchronizer, content_matches, digest_bytes};
use fr_watcher::{WatchContext, WatchEngine, WatchError};
use tracing::{debug, info};

use crate::autoedge::FileAutoEdges;
use crate::error::ResourceError;

/// Resource kind reported in identities.
pub const KIND: &str = "file";

/// A managed file or directory.
///
/// # Examples
///
/// ```no_run
/// use fr_core::FileSpec;
/// use fr_resource::FileResource;
///
/// let motd = FileResource::new(FileSpec::new("motd", "/etc/motd").with_content("hi\n"));
/// motd.validate()?;
/// let converged = motd.check_apply(true)?;
/// # Ok::<(), fr_resource::ResourceError>(())
/// ```
#[derive(Debug)]
pub struct FileResource {
    spec: FileSpec,
    watch: WatchConfig,
    dir_check: DirCheckMode,
    digest: OnceLock<ContentDigest>,
    state_ok: AtomicBool,
}

impl FileResource {
    /// Creates a resource with default watch and sync settings.
    #[must_use]
    pub fn new(spec: FileSpec) -> Self {
        Self {
            spec,
            watch: WatchConfig::default(),
            dir_check: DirCheckMode::default(),
            digest: OnceLock::new(),
            state_ok: AtomicBool::new(false),
        }
    }

    /// Sets the configuration handed to the watch loop.
    #[must_use]
    pub const fn with_watch_config(mut self, watch: WatchConfig) -> Self {
        self.watch = watch;
        self
    }

    /// Sets how directory resources with a source tree are checked.
    #[must_use]
    pub const fn with_dir_check(mut self, mode: DirCheckMode) -> Self {
        self.dir_check = mode;
        self
    }

    /// The definition this resource was built from.
    #[inline]
    #[must_use]
    pub const fn spec(&self) -> &FileSpec {
        &self.spec
    }

    /// Resource name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Resolves `path`, `dirname` and `basename` into the effective path.
    ///
    /// With neither override set, or with an invalid override, this is the
    /// raw `path`. An override replaces the corresponding half of `path`.
    ///
    /// ```
    /// use fr_core::FileSpec;
    /// use fr_resource::FileResource;
    ///
    /// let spec = FileSpec::new("conf", "/etc/app.conf").with_dirname("/opt/app/");
    /// assert_eq!(FileResource::new(spec).get_path(), "/opt/app/app.conf");
    ///
    /// let spec = FileSpec::new("conf", "/etc/app.conf").with_basename("other.conf");
    /// assert_eq!(FileResource::new(spec).get_path(), "/etc/other.conf");
    /// ```
    #[must_use]
    pub fn get_path(&self) -> String {
        let FileSpec {
            path,
            dirname,
            basename,
            ..
        } = &self.spec;

        if self.check_overrides().is_err() || (dirname.is_empty() && basename.is_empty()) {
            path.clone()
        } else if dirname.is_empty() {
            format!("{}{basename}", paths::dirname(path))
        } else if basename.is_empty() {
            format!("{dirname}{}", paths::basename(path))
        } else {
            format!("{dirname}{basename}")
        }
    }

    /// Returns `true` if the resolved path names a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        paths::is_dir_path(&self.get_path())
    }

    fn check_overrides(&self) -> Result<(), ConfigError> {
        let FileSpec { dirname, basename, .. } = &self.spec;
        if !dirname.is_empty() && !dirname.ends_with('/') {
            return Err(ConfigError::invalid_path(dirname.as_str(), "dirname must end with '/'"));
        }
        if basename.starts_with('/') {
            return Err(ConfigError::invalid_path(basename.as_str(), "basename must not start with '/'"));
        }
        Ok(())
    }

    /// Checks the definition.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidConfiguration`] for an empty name, a
    /// `dirname` without a trailing `/`, a `basename` with a leading `/`, or
    /// a resolved path that is not absolute.
    pub fn validate(&self) -> Result<(), ResourceError> {
        let name = self.name();
        if name.is_empty() {
            return Err(ResourceError::invalid(
                name,
                ConfigError::InvalidOption {
                    option: "name".to_owned(),
                    reason: "must not be empty".to_owned(),
                },
            ));
        }
        self.check_overrides().map_err(|err| ResourceError::invalid(name, err))?;

        let path = self.get_path();
        if !path.starts_with('/') {
            return Err(ResourceError::invalid(
                name,
                ConfigError::invalid_path(path, "path must be absolute"),
            ));
        }
        Ok(())
    }

    /// Digest of the desired content, computed once.
    #[must_use]
    pub fn content_digest(&self) -> &ContentDigest {
        self.digest.get_or_init(|| digest_bytes(self.spec.content.as_bytes()))
    }

    /// Returns `true` if the file at the resolved path holds exactly the
    /// desired content. A missing file does not match.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Sync`] if the file exists but cannot be read.
    pub fn content_matches(&self) -> Result<bool, ResourceError> {
        let target = paths::clean(&self.get_path());
        Ok(content_matches(&target, self.content_digest())?)
    }

    /// Whether the last `check_apply` left the resource converged and the
    /// watch loop has not seen anything since.
    #[inline]
    #[must_use]
    pub fn is_state_ok(&self) -> bool {
        self.state_ok.load(Ordering::Acquire)
    }

    /// Examines the filesystem without changing it. Ignores the cached flag.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::TypeMismatch`] when a present resource finds
    /// the wrong kind of object at its path, and I/O or synchronizer errors
    /// from inspecting it.
    pub fn check(&self) -> Result<bool, ResourceError> {
        let target = paths::clean(&self.get_path());
        let meta = stat(&target)?;

        let Some(meta) = meta else {
            return Ok(self.spec.state.is_absent());
        };
        if self.spec.state.is_absent() {
            return Ok(false);
        }
        self.ensure_kind(&target, &meta)?;

        if !self.is_dir() {
            return self.content_matches();
        }
        if self.spec.content.is_empty() {
            return Ok(true);
        }
        let sync = DirectorySynchronizer::new(self.spec.content.as_str(), target);
        Ok(sync.check(self.dir_check)?)
    }

    /// Makes the filesystem match the definition.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::TypeMismatch`] when the object at the path is
    /// the wrong kind, [`ResourceError::NotEmpty`] when an absent directory
    /// still has children, and I/O or synchronizer errors otherwise.
    pub fn apply(&self) -> Result<(), ResourceError> {
        let target = paths::clean(&self.get_path());
        if let Some(meta) = stat(&target)? {
            self.ensure_kind(&target, &meta)?;
        }

        if self.is_dir() {
            self.apply_dir(target)
        } else {
            self.apply_file(target)
        }
    }

    fn apply_file(&self, target: Utf8PathBuf) -> Result<(), ResourceError> {
        if self.spec.state.is_absent() {
            return match fs::remove_file(&target) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(ResourceError::io(target, err)),
            };
        }
        fs::write(&target, self.spec.content.as_bytes()).map_err(|err| ResourceError::io(target, err))
    }

    fn apply_dir(&self, target: Utf8PathBuf) -> Result<(), ResourceError> {
        if self.spec.state.is_absent() {
            return match fs::remove_dir(&target) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::DirectoryNotEmpty => {
                    Err(ResourceError::NotEmpty { path: target })
                }
                Err(err) => Err(ResourceError::io(target, err)),
            };
        }

        if self.spec.content.is_empty() {
            return match fs::create_dir(&target) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
                Err(err) => Err(ResourceError::io(target, err)),
            };
        }

        let sync = DirectorySynchronizer::new(self.spec.content.as_str(), target);
        let report = sync.apply()?;
        debug!(resource = %self.name(), changed = report.changed(), "Directory synchronized");
        Ok(())
    }

    fn ensure_kind(&self, target: &Utf8Path, meta: &fs::Metadata) -> Result<(), ResourceError> {
        let (ok, expected) = if self.is_dir() {
            (meta.is_dir(), "directory")
        } else {
            (meta.is_file(), "file")
        };
        if ok {
            return Ok(());
        }
        Err(ResourceError::TypeMismatch {
            path: target.to_path_buf(),
            expected,
            found: kind_label(meta),
        })
    }

    /// Checks the resource and, if `apply` is set, converges it.
    ///
    /// Returns `true` if the resource was already converged and `false` if
    /// it was not, whether or not it was then fixed. A successful apply
    /// marks the resource converged, so the next call returns `true` until
    /// the watch loop reports a change.
    ///
    /// # Errors
    ///
    /// Any error from [`check`](Self::check) or [`apply`](Self::apply). The
    /// cached flag is left unset.
    pub fn check_apply(&self, apply: bool) -> Result<bool, ResourceError> {
        debug!(resource = %self.name(), apply, "CheckApply");

        if self.is_state_ok() {
            return Ok(true);
        }

        if self.check()? {
            self.state_ok.store(true, Ordering::Release);
            return Ok(true);
        }

        if !apply {
            return Ok(false);
        }

        info!(
            resource = %self.name(),
            path = %self.get_path(),
            state = self.spec.state.label(),
            "Applying"
        );
        self.apply()?;
        self.state_ok.store(true, Ordering::Release);
        Ok(false)
    }

    /// Runs the watch loop for this resource until told to exit.
    ///
    /// # Errors
    ///
    /// See [`WatchEngine::run`].
    pub async fn watch(&self, ctx: WatchContext) -> Result<(), WatchError> {
        let engine = WatchEngine::new(self.name(), &self.get_path(), &self.watch)?;
        engine.run(ctx, &self.state_ok).await
    }

    /// Identities this resource answers to.
    #[must_use]
    pub fn uuids(&self) -> Vec<ResourceUuid> {
        vec![ResourceUuid::new(KIND, self.name(), self.get_path())]
    }

    /// Ancestor directories this resource may depend on.
    #[must_use]
    pub fn auto_edges(&self) -> FileAutoEdges {
        FileAutoEdges::new(self.name(), &self.get_path())
    }

    /// Returns `true` if both resources would converge the same path to the
    /// same state.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.name() == other.name()
            && self.get_path() == other.get_path()
            && self.spec.content == other.spec.content
            && self.spec.state == other.spec.state
    }
}

fn stat(target: &Utf8Path) -> Result<Option<fs::Metadata>, ResourceError> {
    match fs::metadata(target) {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ResourceError::io(target, err)),
    }
}

fn kind_label(meta: &fs::Metadata) -> &'static str {
    if meta.is_dir() {
        "directory"
    } else if meta.is_file() {
        "file"
    } else {
        "special file"
    }
}

impl From<FileSpec> for FileResource {
    fn from(spec: FileSpec) -> Self {
        Self::new(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fr_core::ResourceState;
    use tempfile::TempDir;

    fn utf8_root(dir: &TempDir) -> &Utf8Path {
        Utf8Path::from_path(dir.path()).expect("Invalid path")
    }

    fn file_at(root: &Utf8Path, rel: &str, content: &str) -> FileResource {
        FileResource::new(FileSpec::new(rel, format!("{root}/{rel}")).with_content(content))
    }

    #[test]
    fn test_get_path_plain() {
        let res = FileResource::new(FileSpec::new("motd", "/etc/motd"));
        assert_eq!(res.get_path(), "/etc/motd");
        assert!(!res.is_dir());
    }

    #[test]
    fn test_get_path_overrides() {
        let spec = FileSpec::new("conf", "/etc/app.conf")
            .with_dirname("/opt/")
            .with_basename("app/");
        let res = FileResource::new(spec);
        assert_eq!(res.get_path(), "/opt/app/");
        assert!(res.is_dir());

        let spec = FileSpec::new("www", "/srv/www/").with_dirname("/var/");
        assert_eq!(FileResource::new(spec).get_path(), "/var/www/");
    }

    #[test]
    fn test_get_path_invalid_override_falls_back() {
        let spec = FileSpec::new("conf", "/etc/app.conf").with_dirname("/opt");
        let res = FileResource::new(spec);
        assert_eq!(res.get_path(), "/etc/app.conf");
        assert!(matches!(
            res.validate(),
            Err(ResourceError::InvalidConfiguration { .. })
        ));

        let spec = FileSpec::new("conf", "/etc/app.conf").with_basename("/x");
        let res = FileResource::new(spec);
        assert_eq!(res.get_path(), "/etc/app.conf");
        assert!(res.validate().is_err());
    }

    #[test]
    fn test_validate() {
        assert!(FileResource::new(FileSpec::new("motd", "/etc/motd")).validate().is_ok());
        assert!(FileResource::new(FileSpec::new("motd", "etc/motd")).validate().is_err());
        assert!(FileResource::new(FileSpec::new("", "/etc/motd")).validate().is_err());
    }

    #[test]
    fn test_create_file_scenario() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8_root(&dir);
        fs::create_dir(root.join("x")).expect("Failed to create dir");
        let res = file_at(root, "x/f.txt", "hello");

        assert!(!res.check_apply(false).expect("check should succeed"));
        assert!(!root.join("x/f.txt").exists());

        assert!(!res.check_apply(true).expect("apply should succeed"));
        assert_eq!(
            fs::read_to_string(root.join("x/f.txt")).expect("Failed to read file"),
            "hello"
        );
        assert!(res.is_state_ok());
        assert!(res.check_apply(false).expect("check should succeed"));

        // a fresh instance has no cache and must agree with the disk
        let fresh = file_at(root, "x/f.txt", "hello");
        assert!(fresh.check_apply(false).expect("check should succeed"));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let res = file_at(utf8_root(&dir), "motd", "hi\n");

        assert!(!res.check_apply(true).expect("first apply"));
        assert!(res.check_apply(true).expect("second apply"));

        let fresh = file_at(utf8_root(&dir), "motd", "hi\n");
        assert!(fresh.check_apply(true).expect("fresh apply"));
    }

    #[test]
    fn test_repairs_drifted_content() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8_root(&dir);
        fs::write(root.join("motd"), "old").expect("Failed to write file");
        let res = file_at(root, "motd", "new");

        assert!(!res.check().expect("check should succeed"));
        assert!(!res.check_apply(true).expect("apply should succeed"));
        assert_eq!(fs::read_to_string(root.join("motd")).expect("read"), "new");
    }

    #[test]
    fn test_absent_missing_is_converged() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8_root(&dir);
        let res = FileResource::new(
            FileSpec::new("gone", format!("{root}/gone")).with_state(ResourceState::Absent),
        );

        assert!(res.check_apply(true).expect("check should succeed"));
        assert!(!root.join("gone").exists());
        assert_eq!(fs::read_dir(root).expect("read_dir").count(), 0);
    }

    #[test]
    fn test_absent_file_removed() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8_root(&dir);
        fs::write(root.join("stale"), "x").expect("Failed to write file");
        let res = FileResource::new(
            FileSpec::new("stale", format!("{root}/stale")).with_state(ResourceState::Absent),
        );

        assert!(!res.check_apply(false).expect("check"));
        assert!(!res.check_apply(true).expect("apply"));
        assert!(!root.join("stale").exists());
    }

    #[test]
    fn test_empty_directory_created() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8_root(&dir);
        let res = FileResource::new(FileSpec::new("data", format!("{root}/data/")));

        assert!(!res.check_apply(true).expect("apply"));
        assert!(root.join("data").is_dir());

        let fresh = FileResource::new(FileSpec::new("data", format!("{root}/data/")));
        assert!(fresh.check_apply(false).expect("check"));
    }

    #[test]
    fn test_directory_mirrors_source() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8_root(&dir);
        fs::create_dir_all(root.join("skel/sub")).expect("Failed to create dirs");
        fs::write(root.join("skel/a.txt"), "a").expect("Failed to write file");
        fs::write(root.join("skel/sub/b.txt"), "b").expect("Failed to write file");

        let spec = FileSpec::new("www", format!("{root}/www/")).with_content(root.join("skel").as_str());
        let res = FileResource::new(spec.clone());
        assert!(!res.check_apply(true).expect("apply"));
        assert_eq!(fs::read_to_string(root.join("www/sub/b.txt")).expect("read"), "b");

        assert!(FileResource::new(spec).check_apply(false).expect("check"));
    }

    #[test]
    fn test_absent_directory_with_children() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8_root(&dir);
        fs::create_dir(root.join("full")).expect("Failed to create dir");
        fs::write(root.join("full/child"), "x").expect("Failed to write file");
        let res = FileResource::new(
            FileSpec::new("full", format!("{root}/full/")).with_state(ResourceState::Absent),
        );

        let err = res.check_apply(true).expect_err("remove should fail");
        assert!(matches!(err, ResourceError::NotEmpty { .. }));
        assert!(!res.is_state_ok());

        fs::remove_file(root.join("full/child")).expect("Failed to remove child");
        assert!(!res.check_apply(true).expect("remove should succeed"));
        assert!(!root.join("full").exists());
    }

    #[test]
    fn test_type_mismatch() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8_root(&dir);
        fs::create_dir(root.join("motd")).expect("Failed to create dir");
        fs::write(root.join("data"), "x").expect("Failed to write file");

        let file = file_at(root, "motd", "hi");
        let err = file.check_apply(true).expect_err("file over dir");
        assert!(matches!(
            err,
            ResourceError::TypeMismatch { expected: "file", found: "directory", .. }
        ));

        let absent = FileResource::new(
            FileSpec::new("motd", format!("{root}/motd")).with_state(ResourceState::Absent),
        );
        assert!(matches!(
            absent.check_apply(true),
            Err(ResourceError::TypeMismatch { .. })
        ));
        assert!(root.join("motd").is_dir());

        let dir_res = FileResource::new(FileSpec::new("data", format!("{root}/data/")));
        assert!(matches!(
            dir_res.check_apply(true),
            Err(ResourceError::TypeMismatch { expected: "directory", found: "file", .. })
        ));
    }

    #[test]
    fn test_missing_parent_propagates() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let res = file_at(utf8_root(&dir), "no/such/file", "x");
        let err = res.check_apply(true).expect_err("parent is missing");
        assert!(matches!(err, ResourceError::Io { .. }));
        assert!(!res.is_state_ok());
    }

    #[tokio::test]
    async fn test_watch_start_repairs_unwatched_drift() {
        use std::sync::Arc;
        use tokio::sync::mpsc;

        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8_root(&dir);
        let res = Arc::new(file_at(root, "motd", "good"));
        assert!(!res.check_apply(true).expect("apply"));
        assert!(res.is_state_ok());
        fs::write(root.join("motd"), "BAD").expect("write");

        let converger = fr_watcher::Converger::new(None);
        let (control_tx, control) = mpsc::channel(1);
        let (recheck, mut rechecks) = mpsc::channel(1);
        let ctx = WatchContext {
            control,
            recheck,
            converger: converger.register(),
        };
        let task = tokio::spawn({
            let res = Arc::clone(&res);
            async move { res.watch(ctx).await }
        });

        let request = tokio::time::timeout(std::time::Duration::from_secs(5), rechecks.recv())
            .await
            .expect("timed out waiting for the startup recheck")
            .expect("recheck channel closed");
        assert!(!res.check_apply(true).expect("repair"));
        request.acknowledge();
        assert_eq!(fs::read_to_string(root.join("motd")).expect("read"), "good");

        drop(control_tx);
        while let Some(request) = rechecks.recv().await {
            request.acknowledge();
        }
        task.await.expect("loop should not panic").expect("loop should exit cleanly");
    }

    #[test]
    fn test_content_digest_is_cached() {
        let res = FileResource::new(FileSpec::new("motd", "/etc/motd").with_content("hello"));
        assert!(std::ptr::eq(res.content_digest(), res.content_digest()));
        assert_eq!(*res.content_digest(), digest_bytes(b"hello"));
    }

    #[test]
    fn test_uuids_and_same_as() {
        let a = FileResource::new(FileSpec::new("www", "/srv/www/"));
        let uuids = a.uuids();
        assert_eq!(uuids.len(), 1);
        assert_eq!(uuids[0].path().as_str(), "/srv/www/");
        assert!(!uuids[0].is_reversed());

        let b = FileResource::new(FileSpec::new("www", "/srv/site").with_basename("www/"));
        assert!(a.same_as(&b));

        let c = FileResource::new(FileSpec::new("www", "/srv/www/").with_state(ResourceState::Absent));
        assert!(!a.same_as(&c));
    }
}
