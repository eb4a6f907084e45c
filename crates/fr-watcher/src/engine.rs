//! The per-resource watch loop.
//!
//! [`WatchEngine`] bridges the synchronous `notify` backend to a tokio task.
//! The notify callback runs on the backend's own thread and forwards raw
//! events with `blocking_send` into a bounded channel; the loop multiplexes
//! that channel with control events and the converger's idle timer.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────┐
//! │ notify backend thread     │
//! │ RecommendedWatcher        │── blocking_send ──┐
//! └───────────────────────────┘                   ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ watch loop (tokio task)                                      │
//! │   select! { fs event | ControlEvent | idle timer }           │
//! │   WatchSession::classify ─► move anchor, send / dirty        │
//! │   send ─► RecheckRequest ─► wait for ack                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only one path is watched at a time: the anchor. A directory target
//! anchored at full depth is watched recursively, and the notify backend
//! subscribes subdirectories created later on its own.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use notify::event::{ModifyKind, RenameMode};
use notify::{ErrorKind, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use smallvec::{SmallVec, smallvec};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use fr_core::WatchConfig;
use fr_core::paths;

use crate::converger::ConvergerHandle;
use crate::error::WatchError;
use crate::events::{ControlEvent, ControlKind, RecheckRequest};
use crate::session::{Reaction, Shift, WatchSession};

/// Channels a watch loop talks to its surroundings through.
#[derive(Debug)]
pub struct WatchContext {
    /// Inbound control events. Closing the channel stops the loop cleanly.
    pub control: mpsc::Receiver<ControlEvent>,
    /// Outbound recheck requests.
    pub recheck: mpsc::Sender<RecheckRequest>,
    /// This loop's registration with the converger.
    pub converger: ConvergerHandle,
}

/// Adaptive watch loop for one resource.
///
/// # Examples
///
/// ```no_run
/// use std::sync::atomic::AtomicBool;
/// use fr_core::WatchConfig;
/// use fr_watcher::{Converger, ControlEvent, WatchContext, WatchEngine};
/// use tokio::sync::mpsc;
///
/// # async fn example() -> Result<(), fr_watcher::WatchError> {
/// let converger = Converger::new(None);
/// let (control_tx, control) = mpsc::channel(8);
/// let (recheck, mut rechecks) = mpsc::channel(1);
/// let ctx = WatchContext { control, recheck, converger: converger.register() };
///
/// let engine = WatchEngine::new("motd", "/etc/motd", &WatchConfig::default())?;
/// let state_ok = AtomicBool::new(false);
/// let run = engine.run(ctx, &state_ok);
/// # drop((control_tx, rechecks.recv()));
/// run.await
/// # }
/// ```
#[derive(Debug)]
pub struct WatchEngine {
    name: String,
    session: WatchSession,
    config: WatchConfig,
}

/// Events observed during one pass of the loop, folded together.
#[derive(Debug, Default)]
struct Pending {
    send: bool,
    dirty: bool,
}

impl WatchEngine {
    /// Creates an engine for the configured path `target`.
    ///
    /// A trailing `/` marks a directory target.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidTarget`] if `target` is not absolute.
    pub fn new(name: impl Into<String>, target: &str, config: &WatchConfig) -> Result<Self, WatchError> {
        if !target.starts_with('/') {
            return Err(WatchError::InvalidTarget {
                path: target.to_owned(),
                reason: "path must be absolute",
            });
        }
        let is_dir = paths::is_dir_path(target);
        let session = WatchSession::new(&paths::clean(target), is_dir);

        Ok(Self {
            name: name.into(),
            session,
            config: *config,
        })
    }

    /// Returns the resource name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the anchor state.
    #[inline]
    #[must_use]
    pub const fn session(&self) -> &WatchSession {
        &self.session
    }

    /// Runs until an [`ControlKind::Exit`] event arrives or the control
    /// channel closes.
    ///
    /// `state_ok` is the resource's cached converged flag; the loop only
    /// ever clears it. Once the first watch is registered the flag is
    /// cleared and one recheck is requested, so drift that landed before the
    /// watch was in place is still seen.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Exhausted`] when the OS refuses more watches,
    /// [`WatchError::ChannelClosed`] when the scheduler goes away, and any
    /// other registration or backend failure.
    pub async fn run(mut self, mut ctx: WatchContext, state_ok: &AtomicBool) -> Result<(), WatchError> {
        let (fs_tx, mut fs_rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if fs_tx.blocking_send(res).is_err() {
                trace!("Watch loop gone, dropping filesystem event");
            }
        })?;

        info!(resource = %self.name, target = %self.session.target(), "Watch loop started");

        let mut watched: Option<Utf8PathBuf> = None;
        let mut pending = Pending::default();
        let mut started = false;

        loop {
            if watched.is_none() {
                watched = Some(self.establish(&mut watcher, &mut pending)?);
                if !started {
                    started = true;
                    debug!(resource = %self.name, "Watch registered, requesting startup recheck");
                    pending.send = true;
                    pending.dirty = true;
                }
            }

            if pending.send {
                pending.send = false;
                if pending.dirty {
                    pending.dirty = false;
                    state_ok.store(false, Ordering::Release);
                }
                self.request_recheck(&ctx.recheck).await?;
            }

            tokio::select! {
                Some(res) = fs_rx.recv() => {
                    let event = res.map_err(|err| self.runtime_failure(err))?;
                    ctx.converger.set_converged(false);
                    if self.handle_event(&event, &mut pending) {
                        if let Some(old) = watched.take() {
                            unwatch(&mut watcher, &old);
                        }
                    }
                }
                control = ctx.control.recv() => {
                    ctx.converger.set_converged(false);
                    let Some(control) = control else {
                        debug!(resource = %self.name, "Control channel closed");
                        break;
                    };
                    let kind = control.kind;
                    control.acknowledge();
                    match kind {
                        ControlKind::Exit => break,
                        ControlKind::Poke => pending.send = true,
                        ControlKind::Ping => {}
                    }
                }
                () = ctx.converger.idle_timer() => {
                    trace!(resource = %self.name, "Idle, marking converged");
                    ctx.converger.set_converged(true);
                }
            }
        }

        info!(resource = %self.name, "Watch loop stopped");
        Ok(())
    }

    /// Registers a watch on the deepest existing ancestor of the target.
    fn establish(
        &mut self,
        watcher: &mut RecommendedWatcher,
        pending: &mut Pending,
    ) -> Result<Utf8PathBuf, WatchError> {
        loop {
            let anchor = self.session.anchor();
            let mode = if self.session.is_dir() && self.session.at_target() && self.config.recursive_dirs {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };

            if let Err(err) = watcher.watch(anchor.as_std_path(), mode) {
                match classify_registration(&anchor, err) {
                    Registration::Transient(err) => {
                        debug!(resource = %self.name, anchor = %anchor, error = %err, "Anchor missing, rising");
                        if !self.session.shift(Shift::Rise) {
                            return Err(WatchError::registration(anchor, err));
                        }
                        continue;
                    }
                    Registration::Fatal(err) => return Err(err),
                }
            }

            // the next segment may have appeared while we were not watching
            if let Some(next) = self.session.next_deeper() {
                if next.exists() {
                    debug!(resource = %self.name, anchor = %next, "Deeper path exists, descending");
                    unwatch(watcher, &anchor);
                    self.session.shift(Shift::Descend);
                    pending.send = true;
                    pending.dirty = true;
                    continue;
                }
            }

            debug!(
                resource = %self.name,
                anchor = %anchor,
                depth = self.session.index(),
                max_depth = self.session.max_depth(),
                "Watching"
            );
            return Ok(anchor);
        }
    }

    /// Folds one raw event into `pending`; returns `true` if the anchor moved.
    fn handle_event(&mut self, event: &Event, pending: &mut Pending) -> bool {
        if event.need_rescan() {
            debug!(resource = %self.name, "Backend asked for a rescan");
            pending.send = true;
            pending.dirty = true;
        }

        let mut moved = false;
        for (path, removed) in event_paths(event) {
            let Some(path) = Utf8Path::from_path(path) else {
                warn!(path = %path.display(), "Skipping non-UTF-8 path in file event");
                continue;
            };

            let reaction: Reaction = self.session.classify(path, removed);
            if reaction.is_ignored() {
                trace!(resource = %self.name, path = %path, "Ignoring unrelated event");
                continue;
            }

            debug!(
                resource = %self.name,
                path = %path,
                kind = ?event.kind,
                send = reaction.send,
                shift = ?reaction.shift,
                "Filesystem event"
            );
            pending.send |= reaction.send;
            pending.dirty |= reaction.dirty;
            if let Some(shift) = reaction.shift {
                moved |= self.session.shift(shift);
            }
        }
        moved
    }

    async fn request_recheck(&self, tx: &mpsc::Sender<RecheckRequest>) -> Result<(), WatchError> {
        let (request, ack) = RecheckRequest::new(self.name.as_str());
        tx.send(request).await.map_err(|_| WatchError::ChannelClosed)?;
        ack.await.map_err(|_| WatchError::ChannelClosed)
    }

    fn runtime_failure(&self, err: notify::Error) -> WatchError {
        if matches!(err.kind, ErrorKind::MaxFilesWatch) {
            let path = err
                .paths
                .first()
                .and_then(|p| Utf8Path::from_path(p))
                .map_or_else(|| self.session.anchor(), Utf8Path::to_path_buf);
            return WatchError::Exhausted { path };
        }
        WatchError::Notify(err)
    }
}

/// How a failed registration is handled.
#[derive(Debug)]
enum Registration {
    /// The path vanished; rise and retry.
    Transient(notify::Error),
    /// Stop the loop.
    Fatal(WatchError),
}

fn classify_registration(path: &Utf8Path, err: notify::Error) -> Registration {
    let not_found = match &err.kind {
        ErrorKind::PathNotFound => true,
        ErrorKind::Io(io) => io.kind() == std::io::ErrorKind::NotFound,
        _ => false,
    };
    let exhausted = match &err.kind {
        ErrorKind::MaxFilesWatch => true,
        ErrorKind::Io(io) => io.kind() == std::io::ErrorKind::StorageFull,
        _ => false,
    };

    if not_found {
        Registration::Transient(err)
    } else if exhausted {
        Registration::Fatal(WatchError::Exhausted {
            path: path.to_owned(),
        })
    } else {
        Registration::Fatal(WatchError::registration(path, err))
    }
}

/// Paths touched by an event, each flagged when it stopped existing there.
fn event_paths(event: &Event) -> SmallVec<[(&Path, bool); 2]> {
    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            smallvec![(event.paths[0].as_path(), true), (event.paths[1].as_path(), false)]
        }
        kind => {
            let removed = matches!(
                kind,
                EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From))
            );
            event.paths.iter().map(|p| (p.as_path(), removed)).collect()
        }
    }
}

fn unwatch(watcher: &mut RecommendedWatcher, path: &Utf8Path) {
    // the kernel drops watches on deleted paths by itself
    if let Err(err) = watcher.unwatch(path.as_std_path()) {
        trace!(path = %path, error = %err, "Unwatch failed");
    }
}
