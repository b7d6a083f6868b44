//! Actor mailbox and scheduler hand-off
//!
//! Each process owns one inbox. Senders push envelopes into the ring buffer
//! and race a single atomic CAS (Idle -> Running) to decide who submits the
//! drain worker to the scheduler. The CAS is the only serialization point
//! for a process's message handling: at most one worker drains an inbox at
//! any moment, so receivers need no internal locking.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;

use crate::message::{Envelope, Message};
use crate::pid::Pid;
use crate::ring::RingBuffer;

/// Default number of batch iterations between cooperative yields.
pub const DEFAULT_THROUGHPUT: usize = 300;

/// Maximum envelopes handed to the consumer per batch.
pub const MESSAGE_BATCH_SIZE: usize = 1024 * 4;

const STOPPED: u8 = 0;
const STARTING: u8 = 1;
const IDLE: u8 = 2;
const RUNNING: u8 = 3;

/// Hands drain workers to an executor and advertises the throughput hint
/// governing how often a busy worker yields back to it.
pub trait Scheduler: Send + Sync + 'static {
    fn schedule(&self, task: BoxFuture<'static, ()>);
    fn throughput(&self) -> usize;
}

/// Default scheduler: spawns workers onto the ambient tokio runtime.
pub struct TokioScheduler {
    throughput: usize,
}

impl TokioScheduler {
    pub fn new(throughput: usize) -> Self {
        Self { throughput }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_THROUGHPUT)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }

    fn throughput(&self) -> usize {
        self.throughput
    }
}

/// The consumer side of an inbox: a process hosting a receiver, or an
/// ephemeral responder. The registry stores these.
#[async_trait]
pub trait Processer: Send + Sync + 'static {
    /// Identity of the hosted actor.
    fn pid(&self) -> &Pid;

    /// Enqueue a message for this process. Non-blocking.
    fn send(&self, msg: Message, sender: Option<Pid>);

    /// Deliver a drained batch. Called only by the worker that won the
    /// scheduling CAS.
    async fn invoke(&self, batch: Vec<Envelope>);

    /// User messages this process has delivered so far.
    fn processed(&self) -> u64 {
        0
    }

    /// Run the start sequence: build the receiver, deliver lifecycle
    /// messages, then attach the inbox.
    async fn start(&self);
}

/// Mailbox with the Stopped/Starting/Idle/Running hand-off state machine.
pub struct Inbox {
    rb: RingBuffer<Envelope>,
    consumer: RwLock<Option<Arc<dyn Processer>>>,
    scheduler: Arc<dyn Scheduler>,
    status: AtomicU8,
    myself: Weak<Inbox>,
}

impl Inbox {
    pub fn new(size: usize, scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Arc::new_cyclic(|myself| Self {
            rb: RingBuffer::new(size),
            consumer: RwLock::new(None),
            scheduler,
            status: AtomicU8::new(STOPPED),
            myself: myself.clone(),
        })
    }

    /// Queue an envelope and wake a worker if none is draining. Returns the
    /// envelope back on overflow so the caller can dead-letter it.
    pub fn send(&self, env: Envelope) -> Result<(), Envelope> {
        self.rb.push(env)?;
        self.schedule();
        Ok(())
    }

    /// Attach the consumer and open the inbox for scheduling. The Starting
    /// intermediate state keeps racing senders from observing a half-set
    /// consumer reference.
    pub fn start(&self, consumer: Arc<dyn Processer>) {
        if self
            .status
            .compare_exchange(STOPPED, STARTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            *self.consumer.write() = Some(consumer);
            self.status.store(IDLE, Ordering::Release);
            self.schedule();
        }
    }

    /// Close the inbox. The running worker observes this at its next batch
    /// boundary and exits; queued envelopes are discarded with the buffer.
    pub fn stop(&self) {
        self.status.store(STOPPED, Ordering::Release);
        *self.consumer.write() = None;
    }

    fn schedule(&self) {
        if self
            .status
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            if let Some(inbox) = self.myself.upgrade() {
                self.scheduler.schedule(Box::pin(async move {
                    inbox.process().await;
                }));
            }
        }
    }

    async fn process(self: Arc<Self>) {
        self.run().await;
        if self
            .status
            .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // A send may have slipped in between the final empty pop and the
            // transition back to Idle; it lost the CAS and scheduled nothing,
            // so re-check and reschedule ourselves.
            if !self.rb.is_empty() {
                self.schedule();
            }
        }
    }

    async fn run(&self) {
        let throughput = self.scheduler.throughput();
        let mut i = 0;
        while self.status.load(Ordering::Acquire) != STOPPED {
            if i > throughput {
                i = 0;
                tokio::task::yield_now().await;
            }
            i += 1;

            let batch = self.rb.pop_n(MESSAGE_BATCH_SIZE);
            if batch.is_empty() {
                return;
            }
            let consumer = self.consumer.read().clone();
            match consumer {
                Some(consumer) => consumer.invoke(batch).await,
                None => return,
            }
        }
    }

    #[cfg(test)]
    fn status(&self) -> u8 {
        self.status.load(Ordering::Acquire)
    }
}
