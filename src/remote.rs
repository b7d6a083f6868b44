//! Remote collaborator seam
//!
//! The engine routes envelopes for foreign addresses through this trait.
//! Implementations live outside the core; they serialize payloads with
//! their own type-name registry and stream envelope frames to peers. A
//! failed send turns into `RemoteUnreachableEvent` plus a dead letter.

use crate::error::Result;
use crate::message::Message;
use crate::pid::Pid;

pub trait Remote: Send + Sync + 'static {
    /// Address this collaborator answers for; becomes the engine address.
    fn address(&self) -> &str;

    /// Forward an envelope to the engine owning `target`.
    fn send(&self, target: &Pid, message: Message, sender: Option<Pid>) -> Result<()>;
}
