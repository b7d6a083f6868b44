//! Per-invocation actor view
//!
//! The context is the handle user code receives on every `receive` call.
//! It is long-lived — one per process — but `message` and `sender` are
//! overwritten per invocation by the worker, and only that worker touches
//! them, so no locking is involved. The parent back-reference is
//! non-owning: a pid plus a shared handle to the parent's children map,
//! which is all a dying child needs to unlink itself.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::warn;

use crate::engine::Engine;
use crate::error::{ActorError, Result};
use crate::message::{msg, HealthCheckFailed, Message};
use crate::opts::Opts;
use crate::pid::{valid_segment, Pid, PID_SEPARATOR};
use crate::receiver::{FuncReceiver, Producer};
use crate::repeater::SendRepeater;
use crate::request::Response;

/// Non-owning link from a child's context to its parent.
pub(crate) struct ParentLink {
    pub(crate) pid: Pid,
    pub(crate) children: Arc<DashMap<String, Pid>>,
}

/// Cancels the health-check ticker when dropped or disabled.
struct HealthHandle {
    cancel: oneshot::Sender<()>,
}

/// The view of the runtime exposed to a receiver.
pub struct Context {
    pub(crate) pid: Pid,
    pub(crate) engine: Engine,
    pub(crate) message: Message,
    pub(crate) sender: Option<Pid>,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) children: Arc<DashMap<String, Pid>>,
    user_context: Option<Message>,
    health: Option<HealthHandle>,
}

impl Context {
    pub(crate) fn new(
        pid: Pid,
        engine: Engine,
        parent: Option<ParentLink>,
        user_context: Option<Message>,
    ) -> Self {
        Self {
            pid,
            engine,
            message: msg(()),
            sender: None,
            parent,
            children: Arc::new(DashMap::new()),
            user_context,
            health: None,
        }
    }

    /// Pid of the actor being invoked.
    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    /// Sender of the current message, if it carried one.
    pub fn sender(&self) -> Option<&Pid> {
        self.sender.as_ref()
    }

    /// The current message. Downcast to discriminate:
    /// `ctx.message().downcast_ref::<MyMsg>()`.
    pub fn message(&self) -> Message {
        Arc::clone(&self.message)
    }

    /// The engine hosting this actor.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The opaque value supplied at spawn through `Opts::user_context`.
    pub fn user_context(&self) -> Option<Message> {
        self.user_context.clone()
    }

    /// Send a message to `pid` with this actor as the sender.
    pub fn send(&self, pid: &Pid, message: Message) {
        self.engine
            .send_with_sender(pid, message, Some(self.pid.clone()));
    }

    /// Forward the current message to `pid`, taking over as sender.
    pub fn forward(&self, pid: &Pid) {
        self.engine
            .send_with_sender(pid, self.message(), Some(self.pid.clone()));
    }

    /// Reply to the sender of the current message. Logs and drops the reply
    /// when the message carried no sender.
    pub fn respond(&self, message: Message) {
        match &self.sender {
            Some(sender) => self.engine.send(sender, message),
            None => warn!(pid = %self.pid, "respond with no sender, dropping reply"),
        }
    }

    /// Request/response against another actor; see `Engine::request`.
    pub fn request(&self, pid: &Pid, message: Message, timeout: Duration) -> Response {
        self.engine.request(pid, message, timeout)
    }

    /// Spawn a child under this actor. The child's id extends this actor's
    /// path, and its lifetime is bounded by this actor's: cleanup poisons
    /// all children depth-first.
    pub fn spawn_child(&mut self, producer: Producer, name: &str, opts: Opts) -> Result<Pid> {
        if !valid_segment(name) {
            return Err(ActorError::invalid_name(name));
        }
        if let Some(id) = &opts.id {
            if !valid_segment(id) {
                return Err(ActorError::invalid_name(id.clone()));
            }
        }
        let child_kind = format!("{}{}{}", self.pid.id(), PID_SEPARATOR, name);
        let resolved = opts.kind(child_kind).resolve(name);
        let link = ParentLink {
            pid: self.pid.clone(),
            children: Arc::clone(&self.children),
        };
        let pid = self
            .engine
            .spawn_with_parent(producer, resolved, Some(link))?;
        self.children.insert(pid.id().to_string(), pid.clone());
        Ok(pid)
    }

    /// Spawn a child from a plain function receiver.
    pub fn spawn_child_func<F>(&mut self, f: F, name: &str, opts: Opts) -> Result<Pid>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.spawn_child(FuncReceiver::producer(f), name, opts)
    }

    /// Pid of the parent, when this actor is a child.
    pub fn parent(&self) -> Option<&Pid> {
        self.parent.as_ref().map(|link| &link.pid)
    }

    /// Look up a live child by its full id.
    pub fn child(&self, id: &str) -> Option<Pid> {
        self.children.get(id).map(|entry| entry.value().clone())
    }

    /// Pids of all live children.
    pub fn children(&self) -> Vec<Pid> {
        self.children
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Resolve any registered process by id.
    pub fn get_pid(&self, id: &str) -> Option<Pid> {
        self.engine.registry().get_by_id(id).map(|p| p.pid().clone())
    }

    /// Periodically send `message` to `pid` with this actor as sender.
    pub fn send_repeat(&self, pid: &Pid, message: Message, interval: Duration) -> SendRepeater {
        SendRepeater::start(
            self.engine.clone(),
            self.pid.clone(),
            pid.clone(),
            message,
            interval,
        )
    }

    /// Start a periodic liveness probe. A false result broadcasts
    /// `ActorUnhealthyEvent` and runs this actor's failure path, which
    /// applies the spawn-time supervision policy. Replaces any probe
    /// already running.
    pub fn enable_health_check<P>(&mut self, interval: Duration, predicate: P)
    where
        P: Fn() -> bool + Send + Sync + 'static,
    {
        self.disable_health_check();

        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let engine = self.engine.clone();
        let pid = self.pid.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if !predicate() {
                            engine.broadcast_event(crate::event::Event::ActorUnhealthy {
                                pid: pid.clone(),
                                timestamp: std::time::SystemTime::now(),
                            });
                            engine.send(&pid, msg(HealthCheckFailed));
                        }
                    }
                    _ = &mut cancel_rx => break,
                }
            }
        });
        self.health = Some(HealthHandle { cancel: cancel_tx });
    }

    /// Stop the liveness probe. Idempotent.
    pub fn disable_health_check(&mut self) {
        if let Some(handle) = self.health.take() {
            let _ = handle.cancel.send(());
        }
    }
}
