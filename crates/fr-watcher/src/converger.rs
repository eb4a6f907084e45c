//! Convergence registry shared by all watch loops.
//!
//! Each watch loop registers once and holds a [`ConvergerHandle`]. A loop
//! marks itself converged when its idle timer fires and unconverged on any
//! activity. The whole graph is converged when every registered handle is.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use fr_watcher::Converger;
//!
//! let converger = Converger::new(Some(Duration::from_secs(5)));
//! let a = converger.register();
//! let b = converger.register();
//!
//! a.set_converged(true);
//! assert!(!converger.is_converged());
//! b.set_converged(true);
//! assert!(converger.is_converged());
//!
//! drop(b);
//! assert!(converger.is_converged());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::watch;

#[derive(Debug)]
struct Inner {
    timeout: Option<Duration>,
    next_id: AtomicU64,
    flags: Mutex<FxHashMap<u64, bool>>,
    converged: watch::Sender<bool>,
}

impl Inner {
    fn recompute(&self, flags: &FxHashMap<u64, bool>) {
        let all = !flags.is_empty() && flags.values().all(|converged| *converged);
        self.converged.send_if_modified(|current| {
            let changed = *current != all;
            *current = all;
            changed
        });
    }
}

/// Thread-safe registry of per-resource converged flags.
///
/// Cloning is cheap and every clone refers to the same registry.
#[derive(Debug, Clone)]
pub struct Converger {
    inner: Arc<Inner>,
}

impl Converger {
    /// Creates a registry whose idle timers fire after `timeout`.
    ///
    /// With `None` the timers never fire.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        let (converged, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                timeout,
                next_id: AtomicU64::new(0),
                flags: Mutex::new(FxHashMap::default()),
                converged,
            }),
        }
    }

    /// Registers a new participant, initially unconverged.
    #[must_use]
    pub fn register(&self) -> ConvergerHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut flags = self.inner.flags.lock();
        flags.insert(id, false);
        self.inner.recompute(&flags);
        ConvergerHandle {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Returns `true` if at least one participant is registered and all of
    /// them are converged.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        *self.inner.converged.borrow()
    }

    /// Number of registered participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.flags.lock().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits until the whole registry is converged.
    pub async fn wait_converged(&self) {
        let mut rx = self.inner.converged.subscribe();
        // the sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|converged| *converged).await;
    }
}

/// One participant's view of the registry. Dropping it unregisters.
#[derive(Debug)]
pub struct ConvergerHandle {
    id: u64,
    inner: Arc<Inner>,
}

impl ConvergerHandle {
    /// Records whether this participant is currently converged.
    pub fn set_converged(&self, converged: bool) {
        let mut flags = self.inner.flags.lock();
        flags.insert(self.id, converged);
        self.inner.recompute(&flags);
    }

    /// Returns this participant's flag.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.inner.flags.lock().get(&self.id).copied().unwrap_or(false)
    }

    /// Completes after the configured idle interval; never, if disabled.
    ///
    /// Intended to be recreated on every pass of a `select!` loop, so it only
    /// fires when the loop saw nothing else for the whole interval.
    pub async fn idle_timer(&self) {
        match self.inner.timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    }
}

impl Drop for ConvergerHandle {
    fn drop(&mut self) {
        let mut flags = self.inner.flags.lock();
        flags.remove(&self.id);
        self.inner.recompute(&flags);
    }
}
