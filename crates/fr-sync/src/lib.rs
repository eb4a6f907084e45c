//! Content digests and directory tree synchronization.
//!
//! This crate holds the filesystem-facing half of file convergence: deciding
//! whether on-disk bytes match what is wanted, and making a destination tree
//! mirror a source tree.
//!
//! # Overview
//!
//! - [`digest_bytes`], [`digest_file`], [`content_matches`]: SHA-256 content
//!   comparison
//! - [`TreeWalker`]: depth-first traversal that never follows links
//! - [`DirectorySynchronizer`]: two-pass mirror with a read-only check mode
//! - [`SyncStats`]: atomic counters behind each [`SyncReport`]
//!
//! # Example
//!
//! ```no_run
//! use fr_core::DirCheckMode;
//! use fr_sync::DirectorySynchronizer;
//!
//! let sync = DirectorySynchronizer::new("/srv/skel", "/srv/www");
//! if !sync.check(DirCheckMode::Strict)? {
//!     sync.apply()?;
//! }
//! # Ok::<(), fr_sync::SyncError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! DirectorySynchronizer
//!     │
//!     ├── pass 1: TreeWalker(dest)   remove / repair, fill seen set
//!     ├── pass 2: TreeWalker(source) create what seen lacks
//!     ├── digest (sha2)              file equality
//!     └── SyncStats (atomic counters)
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

mod digest;
mod error;
mod stats;
mod synchronizer;
mod walker;

pub use digest::{ContentDigest, content_matches, digest_bytes, digest_file};
pub use error::SyncError;
pub use stats::{SyncReport, SyncStats};
pub use synchronizer::DirectorySynchronizer;
pub use walker::{EntryKind, TreeEntry, TreeWalker};
