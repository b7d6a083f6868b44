//! Request/response
//!
//! A request spawns an ephemeral responder process and names it as the
//! sender of the outgoing message, so the target's `respond` routes back
//! here. The responder occupies a registry slot like any process, which is
//! what guarantees `Response::result` can always deregister it.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::engine::Engine;
use crate::error::{ActorError, Result};
use crate::inbox::Processer;
use crate::message::{Envelope, Message, PoisonPill};
use crate::pid::Pid;

/// Pending reply of `Engine::request` / `Context::request`.
pub struct Response {
    engine: Engine,
    target: Pid,
    responder: Pid,
    rx: oneshot::Receiver<Message>,
    timeout: Duration,
}

impl Response {
    pub(crate) fn new(
        engine: Engine,
        target: Pid,
        responder: Pid,
        rx: oneshot::Receiver<Message>,
        timeout: Duration,
    ) -> Self {
        Self {
            engine,
            target,
            responder,
            rx,
            timeout,
        }
    }

    /// The pid replies should be addressed to.
    pub fn pid(&self) -> &Pid {
        &self.responder
    }

    /// Await the first message delivered to the responder, or a timeout
    /// error. The responder is cleaned up unconditionally on return.
    pub async fn result(self) -> Result<Message> {
        let Response {
            engine,
            target,
            responder,
            rx,
            timeout,
        } = self;

        let outcome = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(ActorError::ResponseDropped {
                pid: target.to_string(),
            }),
            Err(_) => Err(ActorError::timeout(target.to_string(), timeout)),
        };

        engine.registry().remove(&responder);
        outcome
    }
}

/// One-shot process backing a [`Response`]. The first message delivered
/// resolves the reply channel; everything after is dropped.
pub(crate) struct ResponderProcess {
    pid: Pid,
    reply: Mutex<Option<oneshot::Sender<Message>>>,
    engine: Engine,
}

impl ResponderProcess {
    pub(crate) fn new(pid: Pid, reply: oneshot::Sender<Message>, engine: Engine) -> Self {
        Self {
            pid,
            reply: Mutex::new(Some(reply)),
            engine,
        }
    }
}

#[async_trait]
impl Processer for ResponderProcess {
    fn pid(&self) -> &Pid {
        &self.pid
    }

    fn send(&self, message: Message, _sender: Option<Pid>) {
        // An engine-wide shutdown may poison responders too; treat the pill
        // as completion rather than a reply.
        if let Some(pill) = message.downcast_ref::<PoisonPill>() {
            self.engine.registry().remove(&self.pid);
            if let Some(done) = pill.take_done() {
                let _ = done.send(());
            }
            return;
        }
        if let Some(reply) = self.reply.lock().take() {
            let _ = reply.send(message);
        }
    }

    async fn invoke(&self, _batch: Vec<Envelope>) {}

    async fn start(&self) {}
}
