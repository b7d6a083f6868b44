//! Message model
//!
//! Messages are opaque to the runtime: any `Send + Sync` value behind an
//! [`Arc`], discriminated by the receiving actor with `downcast_ref`. The
//! runtime reserves a handful of payload types for lifecycle signalling;
//! user code observes the lifecycle markers but never the control pills.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::pid::Pid;

/// An opaque message payload. Receivers downcast to concrete types.
pub type Message = Arc<dyn Any + Send + Sync>;

/// Wrap a value as a [`Message`].
pub fn msg<M: Any + Send + Sync>(value: M) -> Message {
    Arc::new(value)
}

/// A message paired with its sender, as queued in an inbox.
#[derive(Clone)]
pub struct Envelope {
    pub msg: Message,
    pub sender: Option<Pid>,
}

impl Envelope {
    pub fn new(msg: Message, sender: Option<Pid>) -> Self {
        Self { msg, sender }
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

/// First message every receiver observes, before [`Started`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Initialized;

/// Second lifecycle message; the actor is registered and reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Started;

/// Final message delivered to a receiver before its process goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopped;

/// Structured failure a receiver (or the runtime) can raise through
/// `std::panic::panic_any` to enter the restart path with context attached.
/// Counts against the restart budget like any other failure.
#[derive(Debug, Clone)]
pub struct InternalError {
    pub from: String,
    pub err: String,
}

/// Control message requesting orderly shutdown. Never shown to receivers.
pub(crate) struct PoisonPill {
    pub(crate) graceful: bool,
    done: Mutex<Option<oneshot::Sender<()>>>,
}

impl PoisonPill {
    pub(crate) fn new(graceful: bool, done: Option<oneshot::Sender<()>>) -> Self {
        Self {
            graceful,
            done: Mutex::new(done),
        }
    }

    /// Take the completion signal. The pill may be cloned into a replay
    /// buffer, so only the first taker gets to signal.
    pub(crate) fn take_done(&self) -> Option<oneshot::Sender<()>> {
        self.done.lock().take()
    }
}

/// In-band signal from a failed child whose supervision policy escalates.
pub(crate) struct Escalation {
    pub(crate) from: Pid,
    pub(crate) reason: String,
}

/// In-band signal from the health-check ticker after a false probe.
pub(crate) struct HealthCheckFailed;
