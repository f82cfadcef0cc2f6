//! Online-user registry
//!
//! Maps display name to the session currently holding it. Every operation
//! takes the one lock exactly once, so rename is never observed half-done.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::RelayError;
use crate::session::SessionHandle;
use crate::types::SessionId;

/// Shared name -> session table
///
/// Cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session under its current name
    ///
    /// Fails with `NameTaken` if the name is already held.
    pub fn register(&self, handle: SessionHandle) -> Result<(), RelayError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&handle.name) {
            return Err(RelayError::NameTaken(handle.name));
        }
        debug!("Registered {} as '{}'", handle.id, handle.name);
        sessions.insert(handle.name.clone(), handle);
        Ok(())
    }

    /// Remove `name` if it still belongs to session `id`
    ///
    /// Returns true only for the call that actually removed the entry,
    /// so concurrent teardown paths can tell who got there first.
    pub fn unregister(&self, name: &str, id: SessionId) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(name) {
            Some(handle) if handle.id == id => {
                sessions.remove(name);
                debug!("Unregistered {} ('{}')", id, name);
                true
            }
            _ => false,
        }
    }

    /// Move session `id` from `old_name` to `new_name`
    ///
    /// Returns the updated handle.
    pub fn rename(
        &self,
        old_name: &str,
        new_name: &str,
        id: SessionId,
    ) -> Result<SessionHandle, RelayError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(new_name) {
            return Err(RelayError::NameTaken(new_name.to_string()));
        }

        let mut handle = match sessions.get(old_name) {
            Some(handle) if handle.id == id => handle.clone(),
            // Already torn down by a concurrent eviction
            _ => return Err(RelayError::SessionGone(old_name.to_string())),
        };

        sessions.remove(old_name);
        handle.name = new_name.to_string();
        sessions.insert(handle.name.clone(), handle.clone());
        Ok(handle)
    }

    /// Find the session holding `name`
    pub fn lookup(&self, name: &str) -> Option<SessionHandle> {
        self.sessions.read().get(name).cloned()
    }

    /// Every registered session as of one lock acquisition
    pub fn snapshot(&self) -> Vec<SessionHandle> {
        self.sessions.read().values().cloned().collect()
    }

    /// Number of sessions online
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Check if nobody is online
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
