//! Periodic sender
//!
//! Owns a timer task that re-sends one message at a fixed interval on
//! behalf of an actor. Cancellation goes through a one-shot channel the
//! task selects on, so a stop takes effect within one interval plus
//! scheduling slack.

use std::time::Duration;

use tokio::sync::oneshot;

use crate::engine::Engine;
use crate::message::Message;
use crate::pid::Pid;

/// Handle to a running repeat-send task.
pub struct SendRepeater {
    cancel: Option<oneshot::Sender<()>>,
}

impl SendRepeater {
    pub(crate) fn start(
        engine: Engine,
        sender: Pid,
        target: Pid,
        message: Message,
        interval: Duration,
    ) -> Self {
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        engine.send_with_sender(&target, message.clone(), Some(sender.clone()));
                    }
                    _ = &mut cancel_rx => break,
                }
            }
        });
        Self {
            cancel: Some(cancel_tx),
        }
    }

    /// Stop repeating. Idempotent; the task exits at its next tick boundary.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl Drop for SendRepeater {
    fn drop(&mut self) {
        self.stop();
    }
}
