//! Anchor arithmetic for a single watch target.
//!
//! A watch can only be registered on a path that exists, so a loop whose
//! target is missing watches the deepest existing ancestor instead (the
//! *anchor*) and moves it as directories appear and vanish. [`WatchSession`]
//! holds that position and decides, for each raw filesystem event, whether
//! the anchor moves and whether the resource needs a recheck. It performs no
//! I/O.
//!
//! Positions count path segments with the root as segment 1, so for the
//! target `/tmp/x/f.txt` the anchor `/` is index 1 and the target itself is
//! index 4.
//!
//! # Examples
//!
//! ```
//! use camino::Utf8Path;
//! use fr_watcher::{Shift, WatchSession};
//!
//! let mut session = WatchSession::new(Utf8Path::new("/tmp/x/f.txt"), false);
//! assert_eq!(session.anchor(), "/tmp/x/f.txt");
//!
//! // registration failed: the file does not exist yet
//! session.shift(Shift::Rise);
//! assert_eq!(session.anchor(), "/tmp/x");
//!
//! // the file shows up under the watched parent
//! let reaction = session.classify(Utf8Path::new("/tmp/x/f.txt"), false);
//! assert!(reaction.send && reaction.dirty);
//! assert_eq!(reaction.shift, Some(Shift::Descend));
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use fr_core::paths::{self, Segments};

/// Direction in which the anchor moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shift {
    /// One level closer to the root.
    Rise,
    /// One level closer to the target.
    Descend,
}

/// Outcome of classifying one event path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Reaction {
    /// The scheduler should recheck the resource.
    pub send: bool,
    /// The cached converged flag must be cleared.
    pub dirty: bool,
    /// Anchor movement, if any.
    pub shift: Option<Shift>,
}

impl Reaction {
    const IGNORE: Self = Self {
        send: false,
        dirty: false,
        shift: None,
    };

    /// Returns `true` if the event changed nothing.
    #[inline]
    #[must_use]
    pub const fn is_ignored(&self) -> bool {
        !self.send && !self.dirty && self.shift.is_none()
    }
}

/// Watch position for one target path.
///
/// Invariant: `1 <= index <= max_depth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSession {
    segments: Segments,
    index: usize,
    target: Utf8PathBuf,
    is_dir: bool,
}

impl WatchSession {
    /// Creates a session anchored at the target itself.
    ///
    /// `target` should be absolute and clean; see [`paths::clean`].
    #[must_use]
    pub fn new(target: &Utf8Path, is_dir: bool) -> Self {
        let segments = paths::segments(target);
        let index = segments.len().max(1);
        Self {
            target: paths::join_segments(&segments),
            segments,
            index,
            is_dir,
        }
    }

    /// The path currently being watched.
    #[must_use]
    pub fn anchor(&self) -> Utf8PathBuf {
        paths::join_segments(&self.segments[..self.index])
    }

    /// The path being tracked.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &Utf8Path {
        &self.target
    }

    /// Whether the target is a directory.
    #[inline]
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Current anchor depth.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Depth of the target.
    #[inline]
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` when the anchor is the target itself.
    #[inline]
    #[must_use]
    pub fn at_target(&self) -> bool {
        self.index == self.max_depth()
    }

    /// The path one level below the anchor, towards the target.
    #[must_use]
    pub fn next_deeper(&self) -> Option<Utf8PathBuf> {
        (!self.at_target()).then(|| paths::join_segments(&self.segments[..=self.index]))
    }

    /// Moves the anchor; returns `false` if it is already at the limit.
    pub fn shift(&mut self, shift: Shift) -> bool {
        match shift {
            Shift::Rise if self.index > 1 => {
                self.index -= 1;
                true
            }
            Shift::Descend if self.index < self.max_depth() => {
                self.index += 1;
                true
            }
            Shift::Rise | Shift::Descend => false,
        }
    }

    /// Signed depth difference between the anchor and an event path.
    ///
    /// `0` when they are equal, negative when the event is below the anchor,
    /// positive when it is above. `None` when neither contains the other.
    #[must_use]
    pub fn depth_delta(&self, event: &Utf8Path) -> Option<isize> {
        let anchor = self.anchor();
        let related =
            paths::has_path_prefix(event, &anchor) || paths::has_path_prefix(&anchor, event);
        related.then(|| depth_as_isize(&anchor) - depth_as_isize(event))
    }

    /// Decides what an event at `event` means for this target.
    ///
    /// `removed` is `true` for deletions and for renames away from `event`.
    #[must_use]
    pub fn classify(&self, event: &Utf8Path, removed: bool) -> Reaction {
        let Some(delta) = self.depth_delta(event) else {
            return Reaction::IGNORE;
        };

        if event == self.target.as_path() {
            let shift = if removed && delta >= 0 {
                Some(Shift::Rise)
            } else if delta < 0 && !self.at_target() {
                Some(Shift::Descend)
            } else {
                None
            };
            return Reaction {
                send: true,
                dirty: true,
                shift,
            };
        }

        if paths::has_path_prefix(&self.target, event) {
            // an ancestor of the target
            let parent = paths::prefix_delta(&self.target, event) == Some(1);
            let shift = if removed && delta >= 0 {
                Some(Shift::Rise)
            } else if delta < 0 && !removed && !self.at_target() {
                Some(Shift::Descend)
            } else {
                None
            };
            let send = parent && delta < 0;
            return Reaction {
                send,
                dirty: send,
                shift,
            };
        }

        if paths::has_path_prefix(event, &self.target) {
            return Reaction {
                send: true,
                dirty: true,
                shift: None,
            };
        }

        Reaction::IGNORE
    }
}

#[allow(clippy::cast_possible_wrap)] // path depth never approaches isize::MAX
fn depth_as_isize(path: &Utf8Path) -> isize {
    paths::depth(path) as isize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn session(target: &str) -> WatchSession {
        WatchSession::new(Utf8Path::new(target), target.ends_with('/'))
    }

    /// A fake filesystem: the set of existing paths.
    struct World(BTreeSet<Utf8PathBuf>);

    impl World {
        fn new(paths: &[&str]) -> Self {
            Self(paths.iter().map(Utf8PathBuf::from).collect())
        }

        fn exists(&self, path: &Utf8Path) -> bool {
            path.as_str() == "/" || self.0.contains(path)
        }

        /// Mimics the engine's registration loop.
        fn register(&self, s: &mut WatchSession) {
            while !self.exists(&s.anchor()) {
                assert!(s.shift(Shift::Rise));
            }
            while let Some(next) = s.next_deeper() {
                if !self.exists(&next) {
                    break;
                }
                s.shift(Shift::Descend);
            }
        }

        fn deepest_existing(&self, s: &WatchSession) -> Utf8PathBuf {
            let mut best = Utf8PathBuf::from("/");
            for ancestor in s.target().ancestors() {
                if self.exists(ancestor) {
                    best = ancestor.to_owned();
                    break;
                }
            }
            best
        }
    }

    fn deliver(world: &World, s: &mut WatchSession, path: &str, removed: bool) -> Reaction {
        let reaction = s.classify(Utf8Path::new(path), removed);
        if let Some(shift) = reaction.shift {
            s.shift(shift);
            world.register(s);
        }
        reaction
    }

    #[test]
    fn test_new_session() {
        let s = session("/tmp/x/f.txt");
        assert_eq!(s.max_depth(), 4);
        assert_eq!(s.index(), 4);
        assert!(s.at_target());
        assert_eq!(s.anchor(), "/tmp/x/f.txt");
        assert!(s.next_deeper().is_none());
        assert!(!s.is_dir());
    }

    #[test]
    fn test_dir_target_is_cleaned() {
        let s = session("/srv/www/");
        assert!(s.is_dir());
        assert_eq!(s.target().as_str(), "/srv/www");
        assert_eq!(s.max_depth(), 3);
    }

    #[test]
    fn test_shift_bounds() {
        let mut s = session("/a");
        assert!(!s.shift(Shift::Descend));
        assert!(s.shift(Shift::Rise));
        assert_eq!(s.anchor(), "/");
        assert!(!s.shift(Shift::Rise));
        assert_eq!(s.index(), 1);
        assert_eq!(s.next_deeper().as_deref(), Some(Utf8Path::new("/a")));
    }

    #[test]
    fn test_depth_delta_sign() {
        let mut s = session("/tmp/x/f.txt");
        s.shift(Shift::Rise);
        // anchor is /tmp/x
        assert_eq!(s.depth_delta(Utf8Path::new("/tmp/x")), Some(0));
        assert_eq!(s.depth_delta(Utf8Path::new("/tmp/x/f.txt")), Some(-1));
        assert_eq!(s.depth_delta(Utf8Path::new("/tmp")), Some(1));
        assert_eq!(s.depth_delta(Utf8Path::new("/tmp/y")), None);
    }

    #[test]
    fn test_target_modified_at_anchor() {
        let s = session("/tmp/x/f.txt");
        let r = s.classify(Utf8Path::new("/tmp/x/f.txt"), false);
        assert_eq!(
            r,
            Reaction {
                send: true,
                dirty: true,
                shift: None
            }
        );
    }

    #[test]
    fn test_target_removed_rises() {
        let s = session("/tmp/x/f.txt");
        let r = s.classify(Utf8Path::new("/tmp/x/f.txt"), true);
        assert!(r.send && r.dirty);
        assert_eq!(r.shift, Some(Shift::Rise));
    }

    #[test]
    fn test_immediate_parent_created_sends() {
        let mut s = session("/tmp/x/f.txt");
        s.shift(Shift::Rise);
        s.shift(Shift::Rise);
        // anchored at /tmp, /tmp/x created
        let r = s.classify(Utf8Path::new("/tmp/x"), false);
        assert!(r.send && r.dirty);
        assert_eq!(r.shift, Some(Shift::Descend));
    }

    #[test]
    fn test_distant_ancestor_created_descends_quietly() {
        let mut s = session("/a/b/c/f");
        for _ in 0..3 {
            s.shift(Shift::Rise);
        }
        // anchored at /a, /a/b created
        let r = s.classify(Utf8Path::new("/a/b"), false);
        assert!(!r.send);
        assert_eq!(r.shift, Some(Shift::Descend));
    }

    #[test]
    fn test_anchor_removed_rises() {
        let mut s = session("/tmp/x/f.txt");
        s.shift(Shift::Rise);
        let r = s.classify(Utf8Path::new("/tmp/x"), true);
        assert_eq!(r.shift, Some(Shift::Rise));
        assert!(!r.send);
    }

    #[test]
    fn test_descendant_of_dir_target() {
        let s = session("/srv/www/");
        let r = s.classify(Utf8Path::new("/srv/www/css/site.css"), false);
        assert!(r.send && r.dirty);
        assert_eq!(r.shift, None);
    }

    #[test]
    fn test_unrelated_sibling_ignored() {
        let mut s = session("/tmp/x/f.txt");
        s.shift(Shift::Rise);
        assert!(s.classify(Utf8Path::new("/tmp/x/other"), false).is_ignored());
        assert!(s.classify(Utf8Path::new("/var/log"), false).is_ignored());
    }

    #[test]
    fn test_anchor_tracks_deepest_existing_ancestor() {
        let target = "/tmp/x/y/f.txt";
        let mut world = World::new(&["/tmp"]);
        let mut s = session(target);
        world.register(&mut s);
        assert_eq!(s.anchor(), "/tmp");

        let steps: &[(&str, bool)] = &[
            ("/tmp/x", false),
            ("/tmp/x/y", false),
            ("/tmp/x/y/f.txt", false),
            ("/tmp/x/y/f.txt", true),
            ("/tmp/x/y", true),
            ("/tmp/x", true),
            ("/tmp/x", false),
        ];

        for &(path, removed) in steps {
            let path = Utf8PathBuf::from(path);
            if removed {
                world.0.remove(&path);
            } else {
                world.0.insert(path.clone());
            }
            let reaction = deliver(&world, &mut s, path.as_str(), removed);
            assert_eq!(s.anchor(), world.deepest_existing(&s), "after {path} ({reaction:?})");
            assert!(s.index() >= 1 && s.index() <= s.max_depth());
        }
    }

    #[test]
    fn test_create_then_notify_sequence() {
        let mut world = World::new(&["/tmp"]);
        let mut s = session("/tmp/x/f.txt");
        world.register(&mut s);

        world.0.insert(Utf8PathBuf::from("/tmp/x"));
        let r = deliver(&world, &mut s, "/tmp/x", false);
        assert!(r.send);
        assert_eq!(s.anchor(), "/tmp/x");

        world.0.insert(Utf8PathBuf::from("/tmp/x/f.txt"));
        let r = deliver(&world, &mut s, "/tmp/x/f.txt", false);
        assert!(r.send && r.dirty);
        assert!(s.at_target());
    }
}
