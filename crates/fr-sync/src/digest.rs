//! SHA-256 content digests.
//!
//! Desired file contents and on-disk files are compared by digest rather than
//! byte-by-byte, so a file is only rewritten when its bytes actually differ.

use std::fmt;
use std::fs::File;
use std::io;

use camino::Utf8Path;
use sha2::{Digest, Sha256};

use crate::error::SyncError;

/// A SHA-256 digest. Displays as lowercase hex.
///
/// # Examples
///
/// ```
/// use fr_sync::digest_bytes;
///
/// let digest = digest_bytes(b"abc");
/// assert_eq!(
///     digest.to_string(),
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Raw digest bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({self})")
    }
}

/// Digests an in-memory byte string.
#[must_use]
pub fn digest_bytes(bytes: &[u8]) -> ContentDigest {
    ContentDigest(Sha256::digest(bytes).into())
}

/// Streams a file through SHA-256.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the file cannot be opened or read. A missing
/// file can be told apart with [`SyncError::is_not_found`].
pub fn digest_file(path: &Utf8Path) -> Result<ContentDigest, SyncError> {
    let mut file = File::open(path).map_err(|e| SyncError::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| SyncError::io(path, e))?;
    Ok(ContentDigest(hasher.finalize().into()))
}

/// Returns whether the file at `path` has the digest `expected`.
///
/// A missing file does not match and is not an error.
///
/// # Errors
///
/// Returns [`SyncError::Io`] for any read failure other than the file not
/// existing.
pub fn content_matches(path: &Utf8Path, expected: &ContentDigest) -> Result<bool, SyncError> {
    match digest_file(path) {
        Ok(actual) => Ok(actual == *expected),
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("Invalid path");
        (dir, root)
    }

    #[test]
    fn test_digest_known_values() {
        assert_eq!(
            digest_bytes(b"").to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(digest_bytes(b"abc"), digest_bytes(b"abc"));
        assert_ne!(digest_bytes(b"abc"), digest_bytes(b"abd"));
    }

    #[test]
    fn test_digest_file_matches_bytes() {
        let (_dir, root) = temp_root();
        let path = root.join("f.txt");
        std::fs::write(&path, b"hello\n").expect("Failed to write file");

        let from_file = digest_file(&path).expect("digest should succeed");
        assert_eq!(from_file, digest_bytes(b"hello\n"));
    }

    #[test]
    fn test_digest_file_missing_is_not_found() {
        let (_dir, root) = temp_root();
        let err = digest_file(&root.join("missing")).expect_err("should fail");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_content_matches() {
        let (_dir, root) = temp_root();
        let path = root.join("f.txt");
        std::fs::write(&path, b"hello\n").expect("Failed to write file");

        assert!(content_matches(&path, &digest_bytes(b"hello\n")).expect("check"));
        assert!(!content_matches(&path, &digest_bytes(b"bye\n")).expect("check"));
        assert!(!content_matches(&root.join("missing"), &digest_bytes(b"")).expect("check"));
    }

    #[test]
    fn test_digest_file_on_directory_fails() {
        let (_dir, root) = temp_root();
        let err = digest_file(&root).expect_err("reading a directory should fail");
        assert!(!err.is_not_found());
    }
}
