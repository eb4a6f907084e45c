//! Managed file resources and the graph glue around them.
//!
//! A [`FileResource`] resolves its configured path, decides whether the
//! filesystem already matches its definition, changes it when asked, and
//! watches it for drift. The rest of this crate connects resources to a
//! scheduler:
//!
//! - [`Resource`] / [`AnyResource`]: the capability the scheduler drives
//! - [`AutoEdge`] / [`FileAutoEdges`]: implicit parent-directory dependencies
//! - [`resolve_auto_edges`] / [`apply_order`]: dependency edges and a
//!   parents-first apply order
//!
//! # Example
//!
//! ```no_run
//! use fr_core::Config;
//! use fr_resource::{AnyResource, Resource, apply_order, resolve_auto_edges};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file(camino::Utf8Path::new("/etc/fr-converge.json"))?;
//! let resources = AnyResource::from_config(&config)?;
//! let edges = resolve_auto_edges(&resources);
//! for index in apply_order(&resources, &edges)? {
//!     let converged = resources[index].check_apply(true)?;
//!     println!("{}: {}", resources[index].name(), if converged { "ok" } else { "fixed" });
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! fr-resource ──► fr-watcher (watch loop)
//!             ├─► fr-sync    (digests, directory mirroring)
//!             └─► fr-core    (FileSpec, ResourceUuid, config)
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod autoedge;
pub mod error;
pub mod file;
pub mod graph;
pub mod resource;

pub use autoedge::{AutoEdge, FileAutoEdges};
pub use error::ResourceError;
pub use file::FileResource;
pub use graph::{Edge, apply_order, resolve_auto_edges};
pub use resource::{AnyResource, Resource};
