//! Basic type definitions for the relay
//!
//! Provides newtype wrappers for type safety:
//! - `SessionId`: UUID-based unique session identifier
//! - `TeardownReason`: why a session ended

use uuid::Uuid;

/// Unique session identifier (newtype pattern)
///
/// Display names can change through `rename|`, so registry entries are
/// also tagged with this id to tell one connection from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a session came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// Peer closed the stream (EOF or a closed-connection I/O error)
    PeerClosed,
    /// IdleMonitor fired before any inbound line arrived
    Evicted,
    /// Unexpected I/O failure; the session is dropped without an offline notice
    Failed,
}

impl TeardownReason {
    /// Whether the rest of the room is told that this user went offline
    pub fn announces_offline(self) -> bool {
        !matches!(self, TeardownReason::Failed)
    }
}
