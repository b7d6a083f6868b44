//! Runtime events
//!
//! Immutable records broadcast on the event stream for observability and
//! supervision. Subscribers receive every event; payloads of dead letters
//! stay opaque, like all messages.

use std::time::SystemTime;

use crate::message::Message;
use crate::pid::Pid;

/// Everything the runtime announces about actor lifecycles and routing.
#[derive(Clone)]
pub enum Event {
    /// The receiver handled `Initialized`.
    ActorInitialized { pid: Pid, timestamp: SystemTime },
    /// The receiver handled `Started`; the actor is reachable.
    ActorStarted { pid: Pid, timestamp: SystemTime },
    /// Terminal cleanup finished; the pid is free for reuse.
    ActorStopped { pid: Pid, timestamp: SystemTime },
    /// A failure was recovered and the actor is restarting.
    ActorRestarted {
        pid: Pid,
        reason: String,
        restarts: u32,
        timestamp: SystemTime,
    },
    /// The restart budget is exhausted; the actor stops for good.
    ActorMaxRestartsExceeded { pid: Pid, timestamp: SystemTime },
    /// A health-check probe returned false.
    ActorUnhealthy { pid: Pid, timestamp: SystemTime },
    /// An envelope could not be delivered to its target.
    DeadLetter {
        target: Pid,
        msg: Message,
        sender: Option<Pid>,
    },
    /// The remote collaborator failed for an address; queued messages to it
    /// become dead letters.
    RemoteUnreachable { address: String },
}

impl Event {
    /// The pid the event concerns, when it concerns one.
    pub fn pid(&self) -> Option<&Pid> {
        match self {
            Event::ActorInitialized { pid, .. }
            | Event::ActorStarted { pid, .. }
            | Event::ActorStopped { pid, .. }
            | Event::ActorRestarted { pid, .. }
            | Event::ActorMaxRestartsExceeded { pid, .. }
            | Event::ActorUnhealthy { pid, .. } => Some(pid),
            Event::DeadLetter { target, .. } => Some(target),
            Event::RemoteUnreachable { .. } => None,
        }
    }

    /// Stable label for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ActorInitialized { .. } => "actor_initialized",
            Event::ActorStarted { .. } => "actor_started",
            Event::ActorStopped { .. } => "actor_stopped",
            Event::ActorRestarted { .. } => "actor_restarted",
            Event::ActorMaxRestartsExceeded { .. } => "actor_max_restarts_exceeded",
            Event::ActorUnhealthy { .. } => "actor_unhealthy",
            Event::DeadLetter { .. } => "dead_letter",
            Event::RemoteUnreachable { .. } => "remote_unreachable",
        }
    }
}

// Dead-letter payloads are type-erased, so Debug elides them.
impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::ActorRestarted {
                pid,
                reason,
                restarts,
                ..
            } => f
                .debug_struct("ActorRestarted")
                .field("pid", pid)
                .field("reason", reason)
                .field("restarts", restarts)
                .finish(),
            Event::DeadLetter { target, sender, .. } => f
                .debug_struct("DeadLetter")
                .field("target", target)
                .field("sender", sender)
                .finish_non_exhaustive(),
            Event::RemoteUnreachable { address } => f
                .debug_struct("RemoteUnreachable")
                .field("address", address)
                .finish(),
            other => match other.pid() {
                Some(pid) => write!(f, "{}({})", other.kind(), pid),
                None => write!(f, "{}", other.kind()),
            },
        }
    }
}
