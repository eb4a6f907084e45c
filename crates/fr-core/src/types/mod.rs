//! Domain types for fr-converge.
//!
//! # Module Organization
//!
//! - [`spec`] - The desired-state record of a file resource
//! - [`state`] - Desired presence of a managed path
//! - [`uuid`] - Resource identity used for graph deduplication and auto-edges
//!
//! All public types are re-exported here and at the crate root:
//!
//! ```
//! use fr_core::{FileSpec, ResourceState, ResourceUuid};
//! ```

mod spec;
mod state;
mod uuid;

pub use spec::FileSpec;
pub use state::ResourceState;
pub use uuid::ResourceUuid;
