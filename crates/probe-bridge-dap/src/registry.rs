//! Registry of open debug sessions.
//!
//! Sessions are independent; the registry only owns them and routes host
//! commands by [`SessionId`].
use std::collections::HashMap;

use crate::bridge::DapBridge;
use crate::session::SessionId;

/// Owns every open [`DapBridge`].
pub struct SessionRegistry {
    sessions: HashMap<SessionId, DapBridge>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Take ownership of a bridge. Returns its id.
    pub fn insert(&mut self, bridge: DapBridge) -> SessionId {
        let id = bridge.id();
        self.sessions.insert(id, bridge);
        id
    }

    /// Get a session by id.
    pub fn get(&self, id: SessionId) -> Option<&DapBridge> {
        self.sessions.get(&id)
    }

    /// Get a mutable session by id.
    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut DapBridge> {
        self.sessions.get_mut(&id)
    }

    /// Remove a session, handing it back to the caller.
    pub fn remove(&mut self, id: SessionId) -> Option<DapBridge> {
        self.sessions.remove(&id)
    }

    /// Ids of sessions that have not terminated, oldest first.
    pub fn active_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, bridge)| !bridge.state().is_terminal())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Number of registered sessions (including terminated ones).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Disconnect every session, then forget them all.
    pub async fn disconnect_all(&mut self, terminate_debuggee: bool) {
        for (id, mut bridge) in self.sessions.drain() {
            if let Err(e) = bridge.disconnect(terminate_debuggee).await {
                tracing::warn!(session = %id, error = %e, "disconnect failed");
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("session_count", &self.sessions.len())
            .field("active", &self.active_sessions())
            .finish()
    }
}
