//! Process identity
//!
//! A [`Pid`] names exactly one actor hosted by an engine: the engine's
//! address plus a kind-qualified id path. Children extend their parent's
//! path, so the id doubles as a position in the supervision tree.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved separator between the kind, the local id, and child segments.
/// User-supplied kinds and ids must not contain it.
pub const PID_SEPARATOR: char = '/';

/// Identity of a single actor: engine address plus id path.
///
/// Pids are cheap to clone and may be shared freely; no component of the
/// runtime owns one exclusively. Equality and hashing cover both fields,
/// so the same id under two addresses names two distinct actors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pid {
    address: String,
    id: String,
}

impl Pid {
    /// Create a pid from an engine address and a fully-formed id path.
    pub fn new(address: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            id: id.into(),
        }
    }

    /// The address of the engine hosting this actor.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The kind-qualified id path, e.g. `player/42` or `player/42/session/7`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this pid belongs to a child spawned under `parent`.
    pub fn is_child_of(&self, parent: &Pid) -> bool {
        self.address == parent.address
            && self.id.len() > parent.id.len()
            && self.id.starts_with(parent.id.as_str())
            && self.id[parent.id.len()..].starts_with(PID_SEPARATOR)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.address, PID_SEPARATOR, self.id)
    }
}

/// Returns true when a user-supplied kind or id segment is usable in a pid.
pub(crate) fn valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(PID_SEPARATOR)
}
