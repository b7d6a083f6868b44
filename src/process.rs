//! Actor host
//!
//! A process owns one receiver's entire lifecycle: the inbox feeding it,
//! the context it sees, panic recovery, the restart budget, and terminal
//! cleanup. All mutable state lives behind one async mutex that is only
//! ever contended in theory — the inbox's Idle -> Running CAS guarantees a
//! single worker, so the lock is a formality the type system demands.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, warn};

use crate::context::{Context, ParentLink};
use crate::engine::Engine;
use crate::event::Event;
use crate::inbox::{Inbox, Processer};
use crate::message::{
    msg, Envelope, Escalation, HealthCheckFailed, Initialized, InternalError, Message, PoisonPill,
    Started, Stopped,
};
use crate::opts::{ResolvedOpts, SupervisionPolicy};
use crate::pid::Pid;
use crate::receiver::{apply_middleware, Producer, Receiver};

/// Why a process entered its failure path.
pub(crate) enum FailureReason {
    /// The receiver panicked; the payload rendered to a string.
    Panic(String),
    /// A structured `InternalError` was raised through `panic_any`.
    Internal { from: String, err: String },
    /// A child with `EscalateFailure` stopped and handed the failure up.
    Escalated { from: Pid, reason: String },
    /// The health-check predicate returned false.
    Unhealthy,
}

impl FailureReason {
    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        if let Some(internal) = payload.downcast_ref::<InternalError>() {
            return FailureReason::Internal {
                from: internal.from.clone(),
                err: internal.err.clone(),
            };
        }
        if let Some(text) = payload.downcast_ref::<&str>() {
            return FailureReason::Panic((*text).to_string());
        }
        if let Some(text) = payload.downcast_ref::<String>() {
            return FailureReason::Panic(text.clone());
        }
        FailureReason::Panic("panic with non-string payload".to_string())
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Panic(reason) => write!(f, "panic: {reason}"),
            FailureReason::Internal { from, err } => write!(f, "internal error in {from}: {err}"),
            FailureReason::Escalated { from, reason } => {
                write!(f, "escalated from {from}: {reason}")
            }
            FailureReason::Unhealthy => write!(f, "health check failed"),
        }
    }
}

enum BatchOutcome {
    /// Every envelope was delivered.
    Completed,
    /// A poison pill ran terminal cleanup; the process is gone.
    Cleaned,
    /// Delivery failed; `remaining` holds the replay buffer.
    Failed {
        reason: FailureReason,
        remaining: Vec<Envelope>,
    },
}

struct ProcState {
    context: Context,
    receiver: Option<Box<dyn Receiver>>,
    /// Envelopes undelivered when the last batch failed; replayed after
    /// restart, starting with the message that failed.
    mbuffer: Vec<Envelope>,
    restarts: u32,
}

/// Host of one receiver. Registered in the registry for its lifetime.
pub(crate) struct ActorProcess {
    pid: Pid,
    engine: Engine,
    producer: Producer,
    opts: ResolvedOpts,
    inbox: Arc<Inbox>,
    state: Mutex<ProcState>,
    processed: AtomicU64,
    myself: Weak<ActorProcess>,
}

impl ActorProcess {
    pub(crate) fn new(
        engine: Engine,
        producer: Producer,
        opts: ResolvedOpts,
        pid: Pid,
        parent: Option<ParentLink>,
    ) -> Arc<Self> {
        let inbox = Inbox::new(opts.inbox_size, engine.scheduler());
        let context = Context::new(
            pid.clone(),
            engine.clone(),
            parent,
            opts.user_context.clone(),
        );
        Arc::new_cyclic(|myself| Self {
            pid,
            engine,
            producer,
            opts,
            inbox,
            state: Mutex::new(ProcState {
                context,
                receiver: None,
                mbuffer: Vec::new(),
                restarts: 0,
            }),
            processed: AtomicU64::new(0),
            myself: myself.clone(),
        })
    }

    /// Deliver one envelope, trapping receiver panics.
    async fn invoke_msg(
        &self,
        state: &mut ProcState,
        env: &Envelope,
    ) -> Result<(), FailureReason> {
        if env.msg.is::<PoisonPill>() {
            return Ok(());
        }
        let ProcState {
            context, receiver, ..
        } = state;
        context.message = Arc::clone(&env.msg);
        context.sender = env.sender.clone();
        if let Some(receiver) = receiver.as_mut() {
            AssertUnwindSafe(receiver.receive(context))
                .catch_unwind()
                .await
                .map_err(FailureReason::from_panic)?;
        }
        Ok(())
    }

    /// Deliver a lifecycle marker with no sender.
    async fn deliver_lifecycle(
        &self,
        state: &mut ProcState,
        message: Message,
    ) -> Result<(), FailureReason> {
        let ProcState {
            context, receiver, ..
        } = state;
        context.message = message;
        context.sender = None;
        if let Some(receiver) = receiver.as_mut() {
            AssertUnwindSafe(receiver.receive(context))
                .catch_unwind()
                .await
                .map_err(FailureReason::from_panic)?;
        }
        Ok(())
    }

    async fn run_batch(&self, state: &mut ProcState, batch: Vec<Envelope>) -> BatchOutcome {
        for i in 0..batch.len() {
            let env = &batch[i];

            if let Some(pill) = env.msg.downcast_ref::<PoisonPill>() {
                if pill.graceful {
                    for env in &batch[i + 1..] {
                        if env.msg.is::<PoisonPill>() {
                            continue;
                        }
                        if self.invoke_msg(state, env).await.is_err() {
                            // Shutdown is already committed; a failure while
                            // draining does not restart the actor.
                            break;
                        }
                        self.processed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                self.cleanup(state, pill.take_done()).await;
                return BatchOutcome::Cleaned;
            }

            if let Some(escalation) = env.msg.downcast_ref::<Escalation>() {
                return BatchOutcome::Failed {
                    reason: FailureReason::Escalated {
                        from: escalation.from.clone(),
                        reason: escalation.reason.clone(),
                    },
                    remaining: batch[i + 1..].to_vec(),
                };
            }

            if env.msg.is::<HealthCheckFailed>() {
                return BatchOutcome::Failed {
                    reason: FailureReason::Unhealthy,
                    remaining: batch[i + 1..].to_vec(),
                };
            }

            if let Err(reason) = self.invoke_msg(state, env).await {
                // The failing message stays in the buffer and is replayed
                // after restart; max_restarts bounds the resulting loop.
                return BatchOutcome::Failed {
                    reason,
                    remaining: batch[i..].to_vec(),
                };
            }
            self.processed.fetch_add(1, Ordering::Relaxed);
        }
        BatchOutcome::Completed
    }

    /// Build a fresh receiver and walk it through Initialized and Started,
    /// replay any buffered envelopes, then open the inbox. Boxed because
    /// restart re-enters this through `handle_failure`.
    fn start_inner<'a>(&'a self, state: &'a mut ProcState) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let receiver = apply_middleware((self.producer)(), &self.opts.middleware);
            state.receiver = Some(receiver);

            if let Err(reason) = self.deliver_lifecycle(state, msg(Initialized)).await {
                return self.handle_failure(state, reason).await;
            }
            self.engine.broadcast_event(Event::ActorInitialized {
                pid: self.pid.clone(),
                timestamp: SystemTime::now(),
            });

            if let Err(reason) = self.deliver_lifecycle(state, msg(Started)).await {
                return self.handle_failure(state, reason).await;
            }
            self.engine.broadcast_event(Event::ActorStarted {
                pid: self.pid.clone(),
                timestamp: SystemTime::now(),
            });

            if !state.mbuffer.is_empty() {
                let buffered = std::mem::take(&mut state.mbuffer);
                match self.run_batch(state, buffered).await {
                    BatchOutcome::Failed { reason, remaining } => {
                        state.mbuffer = remaining;
                        return self.handle_failure(state, reason).await;
                    }
                    BatchOutcome::Cleaned => return,
                    BatchOutcome::Completed => {}
                }
            }

            if let Some(me) = self.myself.upgrade() {
                self.inbox.start(me);
            }
        })
    }

    /// Common failure path: deliver `Stopped` best-effort, then let the
    /// supervision policy decide between restart, stop, and escalation.
    async fn handle_failure(&self, state: &mut ProcState, reason: FailureReason) {
        error!(pid = %self.pid, %reason, "actor failed");
        let _ = self.deliver_lifecycle(state, msg(Stopped)).await;

        match self.opts.supervision_policy {
            SupervisionPolicy::RestartChild => self.try_restart(state, reason).await,
            SupervisionPolicy::StopChild => self.cleanup(state, None).await,
            SupervisionPolicy::EscalateFailure => {
                let parent = state.context.parent.as_ref().map(|link| link.pid.clone());
                self.cleanup(state, None).await;
                if let Some(parent) = parent {
                    self.engine.send_with_sender(
                        &parent,
                        msg(Escalation {
                            from: self.pid.clone(),
                            reason: reason.to_string(),
                        }),
                        Some(self.pid.clone()),
                    );
                }
            }
        }
    }

    async fn try_restart(&self, state: &mut ProcState, reason: FailureReason) {
        if state.restarts >= self.opts.max_restarts {
            warn!(
                pid = %self.pid,
                restarts = state.restarts,
                "max restarts exceeded, stopping actor"
            );
            self.engine.broadcast_event(Event::ActorMaxRestartsExceeded {
                pid: self.pid.clone(),
                timestamp: SystemTime::now(),
            });
            self.cleanup(state, None).await;
            return;
        }

        state.restarts += 1;
        self.engine.metrics_ref().record_restart();
        self.engine.broadcast_event(Event::ActorRestarted {
            pid: self.pid.clone(),
            reason: reason.to_string(),
            restarts: state.restarts,
            timestamp: SystemTime::now(),
        });

        let delay = self
            .opts
            .restart_policy
            .delay(self.opts.restart_delay, state.restarts);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.start_inner(state).await;
    }

    /// Terminal teardown: unlink from the parent, poison children
    /// depth-first and await each, stop the inbox, deregister, deliver the
    /// final `Stopped`, then announce and signal completion.
    async fn cleanup(&self, state: &mut ProcState, done: Option<oneshot::Sender<()>>) {
        state.context.disable_health_check();

        if let Some(parent) = &state.context.parent {
            parent.children.remove(self.pid.id());
        }

        for child in state.context.children() {
            self.engine.poison(&child).wait().await;
        }

        self.inbox.stop();
        self.engine.registry().remove(&self.pid);

        let _ = self.deliver_lifecycle(state, msg(Stopped)).await;
        state.receiver = None;

        self.engine.metrics_ref().record_stop();
        self.engine.broadcast_event(Event::ActorStopped {
            pid: self.pid.clone(),
            timestamp: SystemTime::now(),
        });
        debug!(pid = %self.pid, "actor stopped");

        if let Some(done) = done {
            let _ = done.send(());
        }
    }
}

#[async_trait]
impl Processer for ActorProcess {
    fn pid(&self) -> &Pid {
        &self.pid
    }

    fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    fn send(&self, message: Message, sender: Option<Pid>) {
        let env = Envelope::new(message, sender);
        if let Err(env) = self.inbox.send(env) {
            warn!(pid = %self.pid, "inbox overflow, dead-lettering");
            self.engine.dead_letter(self.pid.clone(), env.msg, env.sender);
        }
    }

    async fn invoke(&self, batch: Vec<Envelope>) {
        let mut state = self.state.lock().await;
        if let BatchOutcome::Failed { reason, remaining } =
            self.run_batch(&mut state, batch).await
        {
            state.mbuffer = remaining;
            self.handle_failure(&mut state, reason).await;
        }
    }

    async fn start(&self) {
        let mut state = self.state.lock().await;
        self.start_inner(&mut state).await;
    }
}
