//! The engine
//!
//! Public surface of the runtime: spawning, routing, request/response,
//! poison, and event subscription. One engine owns one registry, one event
//! stream, and one scheduler; there are no process-wide singletons, so two
//! engines in one program stay fully independent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::context::{Context, ParentLink};
use crate::error::{ActorError, Result};
use crate::event::Event;
use crate::event_stream::{EventStream, EventSubscription, SubscriptionToken};
use crate::inbox::{Processer, Scheduler, TokioScheduler};
use crate::message::{msg, Message, PoisonPill};
use crate::metrics::{EngineMetrics, EngineStats};
use crate::opts::{Opts, ResolvedOpts};
use crate::pid::{valid_segment, Pid, PID_SEPARATOR};
use crate::process::ActorProcess;
use crate::receiver::{FuncReceiver, Producer};
use crate::registry::Registry;
use crate::remote::Remote;
use crate::request::{ResponderProcess, Response};

/// Address of an engine without a remote collaborator.
pub const LOCAL_ADDRESS: &str = "local";

const RESPONDER_KIND: &str = "responder";

/// Engine construction parameters.
#[derive(Default)]
pub struct EngineConfig {
    address: Option<String>,
    scheduler: Option<Arc<dyn Scheduler>>,
    remote: Option<Arc<dyn Remote>>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine address; defaults to `local`, or the remote's address when a
    /// remote collaborator is attached.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Replace the default tokio-backed scheduler.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Attach the remote transport collaborator.
    pub fn remote(mut self, remote: Arc<dyn Remote>) -> Self {
        self.remote = Some(remote);
        self
    }
}

struct EngineInner {
    address: String,
    registry: Registry,
    event_stream: EventStream,
    scheduler: Arc<dyn Scheduler>,
    remote: Option<Arc<dyn Remote>>,
    metrics: EngineMetrics,
    responder_seq: AtomicU64,
}

/// Handle to the runtime. Cheap to clone; every clone is the same engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let address = config
            .address
            .or_else(|| config.remote.as_ref().map(|r| r.address().to_string()))
            .unwrap_or_else(|| LOCAL_ADDRESS.to_string());
        Self {
            inner: Arc::new(EngineInner {
                address,
                registry: Registry::new(),
                event_stream: EventStream::new(),
                scheduler: config
                    .scheduler
                    .unwrap_or_else(|| Arc::new(TokioScheduler::default())),
                remote: config.remote,
                metrics: EngineMetrics::default(),
                responder_seq: AtomicU64::new(1),
            }),
        }
    }

    /// This engine's address, the first half of every pid it issues.
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Spawn an actor and return its pid. The producer runs once now and
    /// again on every restart. The returned pid is live immediately:
    /// messages sent before the receiver handled `Started` queue in the
    /// inbox and are delivered after it.
    pub fn spawn(&self, producer: Producer, name: &str, opts: Opts) -> Result<Pid> {
        if !valid_segment(name) {
            return Err(ActorError::invalid_name(name));
        }
        if let Some(kind) = &opts.kind {
            if !valid_segment(kind) {
                return Err(ActorError::invalid_name(kind.clone()));
            }
        }
        if let Some(id) = &opts.id {
            if !valid_segment(id) {
                return Err(ActorError::invalid_name(id.clone()));
            }
        }
        self.spawn_with_parent(producer, opts.resolve(name), None)
    }

    /// Spawn a plain function as an actor.
    pub fn spawn_func<F>(&self, f: F, name: &str, opts: Opts) -> Result<Pid>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.spawn(FuncReceiver::producer(f), name, opts)
    }

    pub(crate) fn spawn_with_parent(
        &self,
        producer: Producer,
        opts: ResolvedOpts,
        parent: Option<ParentLink>,
    ) -> Result<Pid> {
        let id_path = format!("{}{}{}", opts.kind, PID_SEPARATOR, opts.id);
        let pid = Pid::new(self.address(), id_path);
        let proc = ActorProcess::new(self.clone(), producer, opts, pid.clone(), parent);
        self.inner.registry.add(proc.clone())?;
        self.inner.metrics.record_spawn();
        debug!(pid = %pid, "spawned actor");

        self.inner.scheduler.schedule(Box::pin(async move {
            proc.start().await;
        }));
        Ok(pid)
    }

    /// Send a message with no sender attached.
    pub fn send(&self, pid: &Pid, message: Message) {
        self.send_with_sender(pid, message, None);
    }

    /// Send a message on behalf of `sender`. Local targets route through
    /// the registry; foreign addresses go to the remote collaborator;
    /// anything unresolvable becomes a dead letter.
    pub fn send_with_sender(&self, pid: &Pid, message: Message, sender: Option<Pid>) {
        self.inner.metrics.record_send();

        if pid.address() != self.address() {
            match &self.inner.remote {
                Some(remote) => {
                    if remote.send(pid, Arc::clone(&message), sender.clone()).is_err() {
                        self.broadcast_event(Event::RemoteUnreachable {
                            address: pid.address().to_string(),
                        });
                        self.dead_letter(pid.clone(), message, sender);
                    }
                }
                None => self.dead_letter(pid.clone(), message, sender),
            }
            return;
        }

        match self.inner.registry.get_by_id(pid.id()) {
            Some(proc) => proc.send(message, sender),
            None => self.dead_letter(pid.clone(), message, sender),
        }
    }

    /// Send `message` and await the first reply, bounded by `timeout`. The
    /// reply target is an ephemeral responder that is deregistered when
    /// `Response::result` returns, success or not.
    pub fn request(&self, pid: &Pid, message: Message, timeout: Duration) -> Response {
        let seq = self.inner.responder_seq.fetch_add(1, Ordering::Relaxed);
        let responder_pid = Pid::new(
            self.address(),
            format!("{}{}{}", RESPONDER_KIND, PID_SEPARATOR, seq),
        );

        let (tx, rx) = oneshot::channel();
        let responder = Arc::new(ResponderProcess::new(
            responder_pid.clone(),
            tx,
            self.clone(),
        ));
        if self.inner.registry.add(responder).is_err() {
            // Sequence numbers never collide; a failure here means the
            // registry is corrupt. The dropped sender surfaces as
            // ResponseDropped to the caller.
            warn!(pid = %responder_pid, "failed to register responder");
        }

        self.send_with_sender(pid, message, Some(responder_pid.clone()));
        Response::new(self.clone(), pid.clone(), responder_pid, rx, timeout)
    }

    /// Graceful shutdown: the target drains the batch in flight, then
    /// stops. `wait` resolves once cleanup finished.
    pub fn poison(&self, pid: &Pid) -> StopHandle {
        self.stop_with(pid, true)
    }

    /// Hard stop: queued and in-flight messages after the pill are dropped.
    pub fn stop(&self, pid: &Pid) -> StopHandle {
        self.stop_with(pid, false)
    }

    fn stop_with(&self, pid: &Pid, graceful: bool) -> StopHandle {
        let (tx, rx) = oneshot::channel();
        match self.inner.registry.get_by_id(pid.id()) {
            Some(proc) => proc.send(msg(PoisonPill::new(graceful, Some(tx))), None),
            None => {
                let _ = tx.send(());
                self.dead_letter(pid.clone(), msg(PoisonPill::new(graceful, None)), None);
            }
        }
        StopHandle { rx }
    }

    /// Poison every registered actor and wait for all of them. Children are
    /// reaped by their parents; the duplicate pills they receive directly
    /// resolve harmlessly.
    pub async fn shutdown(&self) {
        let handles: Vec<StopHandle> = self
            .inner
            .registry
            .ids()
            .iter()
            .map(|id| self.poison(&Pid::new(self.address(), id.clone())))
            .collect();
        for handle in handles {
            handle.wait().await;
        }
    }

    /// Register an event subscriber.
    pub fn subscribe(&self) -> EventSubscription {
        self.inner.event_stream.subscribe()
    }

    /// Drop an event subscriber.
    pub fn unsubscribe(&self, token: SubscriptionToken) {
        self.inner.event_stream.unsubscribe(token);
    }

    /// Publish an event to all subscribers.
    pub fn broadcast_event(&self, event: Event) {
        self.inner.event_stream.broadcast(event);
    }

    /// Count of user messages delivered by the process with this pid.
    pub fn processed_count(&self, pid: &Pid) -> Option<u64> {
        self.inner
            .registry
            .get_by_id(pid.id())
            .map(|proc| proc.processed())
    }

    /// Snapshot of the engine-wide counters.
    pub fn metrics(&self) -> EngineStats {
        self.inner.metrics.snapshot()
    }

    pub(crate) fn metrics_ref(&self) -> &EngineMetrics {
        &self.inner.metrics
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::clone(&self.inner.scheduler)
    }

    pub(crate) fn dead_letter(&self, target: Pid, message: Message, sender: Option<Pid>) {
        warn!(pid = %target, "dead letter");
        self.inner.metrics.record_dead_letter();
        self.broadcast_event(Event::DeadLetter {
            target,
            msg: message,
            sender,
        });
    }
}

/// Resolves once the poisoned actor finished cleanup.
pub struct StopHandle {
    rx: oneshot::Receiver<()>,
}

impl StopHandle {
    /// Block until the target's cleanup signalled completion. Also resolves
    /// when the target disappeared before processing the pill.
    pub async fn wait(self) {
        let _ = self.rx.await;
    }
}
