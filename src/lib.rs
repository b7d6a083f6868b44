//! Local actor runtime
//!
//! Hosts many independently-scheduled actors inside one process. Every
//! actor owns a private mailbox; messages from one sender arrive in send
//! order; failures are recovered by the hosting process under a
//! configurable supervision policy.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       Engine                         │
//! │                                                      │
//! │  send(pid, msg) ──► Registry ──► Process ──► Inbox   │
//! │                        │            │          │     │
//! │                        │            │     ring buffer│
//! │                        │            │          │     │
//! │                        │            ▼          ▼     │
//! │                        │     Receiver ◄── worker     │
//! │                        │     (batch invoke)          │
//! │                        ▼                             │
//! │                  EventStream ──► subscribers         │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Sends push into a lock-free ring buffer and race a single CAS to hand
//! the process to the scheduler; the winning worker drains batches until
//! the buffer is empty. At most one worker ever runs a given receiver, so
//! user code needs no locks.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use troupe::{msg, producer, Context, Engine, EngineConfig, Opts, Receiver};
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl Receiver for Echo {
//!     async fn receive(&mut self, ctx: &mut Context) {
//!         if let Some(text) = ctx.message().downcast_ref::<String>() {
//!             ctx.respond(msg(text.clone()));
//!         }
//!     }
//! }
//!
//! # async fn run() -> troupe::Result<()> {
//! let engine = Engine::new(EngineConfig::new());
//! let pid = engine.spawn(producer(|| Echo), "echo", Opts::new())?;
//!
//! let reply = engine
//!     .request(&pid, msg("ping".to_string()), Duration::from_millis(100))
//!     .result()
//!     .await?;
//! assert_eq!(reply.downcast_ref::<String>().map(String::as_str), Some("ping"));
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod event;
pub mod event_stream;
pub mod inbox;
pub mod message;
pub mod metrics;
pub mod opts;
pub mod pid;
pub mod receiver;
pub mod registry;
pub mod remote;
pub mod repeater;
pub mod request;
pub mod ring;

mod process;

pub use context::Context;
pub use engine::{Engine, EngineConfig, StopHandle, LOCAL_ADDRESS};
pub use error::{ActorError, Result};
pub use event::Event;
pub use event_stream::{EventSubscription, SubscriptionToken};
pub use inbox::{Scheduler, TokioScheduler, DEFAULT_THROUGHPUT, MESSAGE_BATCH_SIZE};
pub use message::{msg, Envelope, Initialized, InternalError, Message, Started, Stopped};
pub use metrics::EngineStats;
pub use opts::{Opts, RestartPolicy, SupervisionPolicy};
pub use pid::{Pid, PID_SEPARATOR};
pub use receiver::{producer, Middleware, Producer, Receiver};
pub use remote::Remote;
pub use repeater::SendRepeater;
pub use request::Response;
