//! Messages exchanged between watch loops and their scheduler.
//!
//! # Event Flow
//!
//! ```text
//! scheduler ── ControlEvent ──► watch loop
//! watch loop ── RecheckRequest ──► scheduler
//!                      ◄── ack ──
//! ```
//!
//! Every [`RecheckRequest`] carries a oneshot acknowledgement. The loop waits
//! for it before handling the next event, so a slow scheduler throttles the
//! loop instead of building a backlog.

use tokio::sync::oneshot;

/// Kind of a control event sent to a watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Stop the loop and return cleanly.
    Exit,
    /// Ask for a recheck without invalidating cached state.
    Poke,
    /// Acknowledged no-op.
    Ping,
}

/// A control event with an optional acknowledgement channel.
///
/// # Examples
///
/// ```
/// use fr_watcher::{ControlEvent, ControlKind};
///
/// let (event, ack) = ControlEvent::with_ack(ControlKind::Ping);
/// assert_eq!(event.kind, ControlKind::Ping);
/// event.acknowledge();
/// assert!(ack.blocking_recv().is_ok());
/// ```
#[derive(Debug)]
pub struct ControlEvent {
    /// What the loop should do.
    pub kind: ControlKind,
    /// Signalled once the loop has received the event.
    pub ack: Option<oneshot::Sender<()>>,
}

impl ControlEvent {
    /// Creates a fire-and-forget control event.
    #[inline]
    #[must_use]
    pub const fn new(kind: ControlKind) -> Self {
        Self { kind, ack: None }
    }

    /// Creates a control event and the receiver of its acknowledgement.
    #[must_use]
    pub fn with_ack(kind: ControlKind) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { kind, ack: Some(tx) }, rx)
    }

    /// Shorthand for an [`ControlKind::Exit`] event.
    #[inline]
    #[must_use]
    pub const fn exit() -> Self {
        Self::new(ControlKind::Exit)
    }

    /// Acknowledges receipt, if the sender asked for it.
    pub fn acknowledge(self) {
        if let Some(ack) = self.ack {
            // the sender may have stopped waiting
            let _ = ack.send(());
        }
    }
}

/// "Please recheck me", sent by a watch loop to its scheduler.
#[derive(Debug)]
pub struct RecheckRequest {
    /// Name of the resource to recheck.
    pub resource: String,
    ack: oneshot::Sender<()>,
}

impl RecheckRequest {
    /// Creates a request and the receiver the loop waits on.
    #[must_use]
    pub fn new(resource: impl Into<String>) -> (Self, oneshot::Receiver<()>) {
        let (ack, rx) = oneshot::channel();
        (
            Self {
                resource: resource.into(),
                ack,
            },
            rx,
        )
    }

    /// Releases the waiting loop.
    pub fn acknowledge(self) {
        let _ = self.ack.send(());
    }
}
