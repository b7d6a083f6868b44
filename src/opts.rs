//! Spawn-time configuration
//!
//! `Opts` collects everything a process needs beyond its producer. The
//! builder methods consume and return `self` so call sites read as one
//! chain; anything left unset falls back to the documented defaults.

use std::time::Duration;

use crate::message::Message;
use crate::receiver::Middleware;

/// Default inbox capacity.
pub const DEFAULT_INBOX_SIZE: usize = 4096;

/// Default restart budget.
pub const DEFAULT_MAX_RESTARTS: u32 = 3;

/// Default base delay between restarts.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(500);

/// Ceiling for exponential backoff delays.
pub(crate) const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(30);

/// How a parent-facing failure of this actor is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupervisionPolicy {
    /// Restart in place, subject to the restart budget.
    #[default]
    RestartChild,
    /// Stop this actor and run the parent's own failure path.
    EscalateFailure,
    /// Stop without restarting.
    StopChild,
}

/// Delay schedule between successive restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    /// Restart without sleeping.
    ImmediateRestart,
    /// Sleep the configured delay each time.
    #[default]
    FixedDelay,
    /// Sleep `delay * 2^(restarts - 1)`, capped at 30 seconds.
    ExponentialBackoff,
}

impl RestartPolicy {
    /// The sleep before restart number `restarts` (1-based).
    pub(crate) fn delay(&self, base: Duration, restarts: u32) -> Duration {
        match self {
            RestartPolicy::ImmediateRestart => Duration::ZERO,
            RestartPolicy::FixedDelay => base,
            RestartPolicy::ExponentialBackoff => {
                let exponent = restarts.saturating_sub(1).min(16);
                base.saturating_mul(1 << exponent).min(MAX_BACKOFF_DELAY)
            }
        }
    }
}

/// Per-spawn configuration.
#[derive(Clone, Default)]
pub struct Opts {
    pub(crate) kind: Option<String>,
    pub(crate) id: Option<String>,
    pub(crate) inbox_size: Option<usize>,
    pub(crate) max_restarts: Option<u32>,
    pub(crate) restart_delay: Option<Duration>,
    pub(crate) middleware: Vec<Middleware>,
    pub(crate) user_context: Option<Message>,
    pub(crate) supervision_policy: SupervisionPolicy,
    pub(crate) restart_policy: RestartPolicy,
}

impl Opts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path prefix component; defaults to the spawn name.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Local id; defaults to a random integer unique within the engine.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Inbox capacity; defaults to 4096.
    pub fn inbox_size(mut self, size: usize) -> Self {
        self.inbox_size = Some(size);
        self
    }

    /// Restart budget; defaults to 3.
    pub fn max_restarts(mut self, max: u32) -> Self {
        self.max_restarts = Some(max);
        self
    }

    /// Base restart delay; defaults to 500 ms.
    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = Some(delay);
        self
    }

    /// Append a receive wrapper. The first added is the outermost.
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Opaque user value exposed through `Context::user_context`.
    pub fn user_context(mut self, value: Message) -> Self {
        self.user_context = Some(value);
        self
    }

    pub fn supervision_policy(mut self, policy: SupervisionPolicy) -> Self {
        self.supervision_policy = policy;
        self
    }

    pub fn restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }
}

/// Fully-resolved options as carried by a process.
#[derive(Clone)]
pub(crate) struct ResolvedOpts {
    pub(crate) kind: String,
    pub(crate) id: String,
    pub(crate) inbox_size: usize,
    pub(crate) max_restarts: u32,
    pub(crate) restart_delay: Duration,
    pub(crate) middleware: Vec<Middleware>,
    pub(crate) user_context: Option<Message>,
    pub(crate) supervision_policy: SupervisionPolicy,
    pub(crate) restart_policy: RestartPolicy,
}

impl Opts {
    pub(crate) fn resolve(self, default_kind: &str) -> ResolvedOpts {
        ResolvedOpts {
            kind: self.kind.unwrap_or_else(|| default_kind.to_string()),
            id: self
                .id
                .unwrap_or_else(|| rand::random::<u64>().to_string()),
            inbox_size: self.inbox_size.unwrap_or(DEFAULT_INBOX_SIZE),
            max_restarts: self.max_restarts.unwrap_or(DEFAULT_MAX_RESTARTS),
            restart_delay: self.restart_delay.unwrap_or(DEFAULT_RESTART_DELAY),
            middleware: self.middleware,
            user_context: self.user_context,
            supervision_policy: self.supervision_policy,
            restart_policy: self.restart_policy,
        }
    }
}
