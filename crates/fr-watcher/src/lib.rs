//! Adaptive filesystem watching for managed resources.
//!
//! Each managed path gets its own long-lived watch loop. The loop keeps a
//! `notify` watch on the deepest existing ancestor of its target, follows the
//! target as directories appear and disappear, and asks the scheduler to
//! recheck the resource whenever something relevant changes.
//!
//! # Overview
//!
//! - [`WatchSession`]: pure anchor arithmetic and event classification
//! - [`WatchEngine`]: the `notify` + tokio loop driving a session
//! - [`ControlEvent`] / [`RecheckRequest`]: messages to and from the scheduler
//! - [`Converger`]: shared registry answering "is everything idle?"
//!
//! # Crate Dependencies
//!
//! ```text
//! fr-cli ──► fr-resource ──► fr-watcher ──► fr-core
//!                        └─► fr-sync ─────►
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use fr_core::WatchConfig;
//! use fr_watcher::{ControlEvent, Converger, WatchContext, WatchEngine};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converger = Converger::new(None);
//!     let (control_tx, control) = mpsc::channel(8);
//!     let (recheck, mut rechecks) = mpsc::channel(1);
//!
//!     let engine = WatchEngine::new("motd", "/etc/motd", &WatchConfig::default())?;
//!     let ctx = WatchContext { control, recheck, converger: converger.register() };
//!     let task = tokio::spawn(async move {
//!         let state_ok = AtomicBool::new(false);
//!         engine.run(ctx, &state_ok).await
//!     });
//!
//!     if let Some(request) = rechecks.recv().await {
//!         println!("recheck {}", request.resource);
//!         request.acknowledge();
//!     }
//!
//!     control_tx.send(ControlEvent::exit()).await?;
//!     task.await??;
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! ```
//! use fr_watcher::WatchError;
//!
//! fn handle_watch_error(err: &WatchError) -> &'static str {
//!     if err.is_exhausted() {
//!         "out of watches"
//!     } else {
//!         "watch stopped"
//!     }
//! }
//! # assert_eq!(handle_watch_error(&WatchError::ChannelClosed), "watch stopped");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod converger;
pub mod engine;
pub mod error;
pub mod events;
pub mod session;

pub use converger::{Converger, ConvergerHandle};
pub use engine::{WatchContext, WatchEngine};
pub use error::WatchError;
pub use events::{ControlEvent, ControlKind, RecheckRequest};
pub use session::{Reaction, Shift, WatchSession};
