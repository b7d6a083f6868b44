//! Receiver trait, producers, and middleware
//!
//! A receiver is the user-defined object hosted by a process. The process
//! invokes `receive` at most once concurrently, so implementations need no
//! internal synchronization. Producers build a fresh receiver at spawn and
//! again on every restart; middleware decorates the receiver at that point,
//! so every message — lifecycle included — flows through the same chain.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;

/// User-defined message handler. Discriminate with
/// `ctx.message().downcast_ref::<T>()`.
#[async_trait]
pub trait Receiver: Send + 'static {
    async fn receive(&mut self, ctx: &mut Context);
}

/// Factory building a fresh [`Receiver`] for a spawn or restart.
pub type Producer = Arc<dyn Fn() -> Box<dyn Receiver> + Send + Sync>;

/// Build a [`Producer`] from a constructor closure.
pub fn producer<R, F>(f: F) -> Producer
where
    R: Receiver,
    F: Fn() -> R + Send + Sync + 'static,
{
    Arc::new(move || Box::new(f()) as Box<dyn Receiver>)
}

/// A receive decorator. The first middleware in a spawn's list becomes the
/// outermost wrapper.
pub type Middleware = Arc<dyn Fn(Box<dyn Receiver>) -> Box<dyn Receiver> + Send + Sync>;

/// Wrap `receiver` with `middleware`, outside-in.
pub(crate) fn apply_middleware(
    mut receiver: Box<dyn Receiver>,
    middleware: &[Middleware],
) -> Box<dyn Receiver> {
    for wrap in middleware.iter().rev() {
        receiver = wrap(receiver);
    }
    receiver
}

/// Adapts a plain function to a [`Receiver`] for `spawn_func`.
pub(crate) struct FuncReceiver<F> {
    f: Arc<F>,
}

impl<F> FuncReceiver<F>
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    pub(crate) fn producer(f: F) -> Producer {
        let f = Arc::new(f);
        Arc::new(move || {
            Box::new(FuncReceiver { f: Arc::clone(&f) }) as Box<dyn Receiver>
        })
    }
}

#[async_trait]
impl<F> Receiver for FuncReceiver<F>
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    async fn receive(&mut self, ctx: &mut Context) {
        (self.f)(ctx);
    }
}
