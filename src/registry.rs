//! Process directory
//!
//! Maps pid ids to live processes. Spawners insert, cleanup removes, send
//! paths look up. DashMap's shard locks give fine-grained concurrency; no
//! iteration order is exposed.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{ActorError, Result};
use crate::inbox::Processer;
use crate::pid::Pid;

pub struct Registry {
    processes: DashMap<String, Arc<dyn Processer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            processes: DashMap::new(),
        }
    }

    /// Register a process under its pid id. Rejects ids already present:
    /// a pid must stay unique for the process's lifetime.
    pub fn add(&self, proc: Arc<dyn Processer>) -> Result<()> {
        let id = proc.pid().id().to_string();
        match self.processes.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                Err(ActorError::duplicate(entry.key().clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(proc);
                Ok(())
            }
        }
    }

    /// Look up a process by exact id.
    pub fn get_by_id(&self, id: &str) -> Option<Arc<dyn Processer>> {
        self.processes.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a process at terminal cleanup. The id becomes reusable.
    pub fn remove(&self, pid: &Pid) {
        self.processes.remove(pid.id());
    }

    /// Ids of all registered processes at this instant.
    pub fn ids(&self) -> Vec<String> {
        self.processes
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
