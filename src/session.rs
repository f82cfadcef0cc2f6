//! Session struct definition
//!
//! A `Session` is the server-side state for one connected peer. It is owned
//! by that peer's read loop; the registry only keeps a `SessionHandle`.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::broadcaster::Broadcaster;
use crate::error::{RelayError, SendError};
use crate::message::{format_broadcast, ServerNotice, OFFLINE_BODY, ONLINE_BODY};
use crate::registry::Registry;
use crate::types::{SessionId, TeardownReason};

/// Registry entry for a connected session
///
/// Cheap to clone; holds the sending side of the session's outbound queue.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Connection identity, stable across renames
    pub id: SessionId,
    /// Display name (registry key)
    pub name: String,
    /// Remote address of the peer
    pub addr: String,
    outbound: mpsc::Sender<String>,
}

impl SessionHandle {
    pub fn new(id: SessionId, name: String, addr: String, outbound: mpsc::Sender<String>) -> Self {
        Self {
            id,
            name,
            addr,
            outbound,
        }
    }

    /// Queue a line for this session without waiting
    ///
    /// Used by fan-out and direct messages so one slow reader never holds
    /// up anyone else.
    pub fn deliver(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.outbound.try_send(line.into()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

/// Server-side state for one connected peer
///
/// The registry and broadcaster are handed in as capabilities; the session
/// keeps no reference back to the engine.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    name: String,
    addr: String,
    outbound: mpsc::Sender<String>,
    registry: Registry,
    broadcaster: Broadcaster,
}

impl Session {
    /// Create a session whose initial name is its remote address
    pub fn new(
        id: SessionId,
        addr: String,
        outbound: mpsc::Sender<String>,
        registry: Registry,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            id,
            name: addr.clone(),
            addr,
            outbound,
            registry,
            broadcaster,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registry entry for the current name
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(
            self.id,
            self.name.clone(),
            self.addr.clone(),
            self.outbound.clone(),
        )
    }

    /// Send a line to this session's own client
    ///
    /// Waits for queue space: a client that does not read only slows itself.
    pub async fn reply(&self, line: impl Into<String>) -> Result<(), RelayError> {
        self.outbound
            .send(line.into())
            .await
            .map_err(|_| RelayError::ConnectionClosed)
    }

    /// Send a notice to this session's own client
    pub async fn notify(&self, notice: ServerNotice) -> Result<(), RelayError> {
        self.reply(notice).await
    }

    /// Publish `[addr]name:body` to everyone online
    pub async fn publish(&self, body: &str) -> Result<(), RelayError> {
        self.broadcaster
            .publish(format_broadcast(&self.addr, &self.name, body))
            .await
    }

    /// Register and announce the session
    pub async fn online(&self) -> Result<(), RelayError> {
        self.registry.register(self.handle())?;
        info!("Session {} online as '{}'", self.id, self.name);
        self.publish(ONLINE_BODY).await
    }

    /// Unregister the session, announcing it unless the drop was abnormal
    ///
    /// Safe to call more than once; only the call that removes the entry
    /// publishes the offline notice.
    pub async fn offline(&self, reason: TeardownReason) {
        if !self.registry.unregister(&self.name, self.id) {
            debug!("Session {} already offline", self.id);
            return;
        }

        info!("Session {} ('{}') offline: {:?}", self.id, self.name, reason);
        if reason.announces_offline() {
            if let Err(e) = self.publish(OFFLINE_BODY).await {
                debug!("Offline notice for {} not published: {}", self.id, e);
            }
        }
    }

    /// Switch to a new display name
    pub fn rename(&mut self, new_name: &str) -> Result<(), RelayError> {
        let handle = self.registry.rename(&self.name, new_name, self.id)?;
        info!("Session {} renamed '{}' -> '{}'", self.id, self.name, handle.name);
        self.name = handle.name;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn session(addr: &str, registry: &Registry, broadcaster: &Broadcaster) -> (Session, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        let session = Session::new(
            SessionId::new(),
            addr.to_string(),
            tx,
            registry.clone(),
            broadcaster.clone(),
        );
        (session, rx)
    }

    async fn recv(rx: &mut mpsc::Receiver<String>) -> String {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("queue closed")
    }

    #[tokio::test]
    async fn test_initial_name_is_addr() {
        let registry = Registry::new();
        let (broadcaster, _relay) = Broadcaster::spawn(registry.clone(), 16);
        let (s, _rx) = session("10.0.0.1:1", &registry, &broadcaster);

        assert_eq!(s.name(), "10.0.0.1:1");
        assert_eq!(s.addr(), "10.0.0.1:1");
    }

    #[tokio::test]
    async fn test_online_announces_to_everyone() {
        let registry = Registry::new();
        let (broadcaster, _relay) = Broadcaster::spawn(registry.clone(), 16);
        let (a, mut a_rx) = session("10.0.0.1:1", &registry, &broadcaster);
        let (b, mut b_rx) = session("10.0.0.2:2", &registry, &broadcaster);

        a.online().await.unwrap();
        assert_eq!(recv(&mut a_rx).await, "[10.0.0.1:1]10.0.0.1:1:already online~");

        b.online().await.unwrap();
        assert_eq!(recv(&mut a_rx).await, "[10.0.0.2:2]10.0.0.2:2:already online~");
        assert_eq!(recv(&mut b_rx).await, "[10.0.0.2:2]10.0.0.2:2:already online~");
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_offline_twice_announces_once() {
        let registry = Registry::new();
        let (broadcaster, _relay) = Broadcaster::spawn(registry.clone(), 16);
        let (watcher, mut watcher_rx) = session("10.0.0.1:1", &registry, &broadcaster);
        let (leaver, _leaver_rx) = session("10.0.0.2:2", &registry, &broadcaster);

        watcher.online().await.unwrap();
        leaver.online().await.unwrap();
        recv(&mut watcher_rx).await;
        recv(&mut watcher_rx).await;

        leaver.offline(TeardownReason::PeerClosed).await;
        leaver.offline(TeardownReason::Evicted).await;

        assert_eq!(recv(&mut watcher_rx).await, "[10.0.0.2:2]10.0.0.2:2:already offline~");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(watcher_rx.try_recv().is_err());
        assert!(registry.lookup("10.0.0.2:2").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_teardown_is_silent() {
        let registry = Registry::new();
        let (broadcaster, _relay) = Broadcaster::spawn(registry.clone(), 16);
        let (watcher, mut watcher_rx) = session("10.0.0.1:1", &registry, &broadcaster);
        let (leaver, _leaver_rx) = session("10.0.0.2:2", &registry, &broadcaster);

        watcher.online().await.unwrap();
        leaver.online().await.unwrap();
        recv(&mut watcher_rx).await;
        recv(&mut watcher_rx).await;

        leaver.offline(TeardownReason::Failed).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(watcher_rx.try_recv().is_err());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_deliver_reports_full_queue() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = SessionHandle::new(SessionId::new(), "a".into(), "a".into(), tx);

        assert_eq!(handle.deliver("one"), Ok(()));
        assert_eq!(handle.deliver("two"), Err(SendError::QueueFull));
    }

    #[tokio::test]
    async fn test_deliver_reports_closed_queue() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = SessionHandle::new(SessionId::new(), "a".into(), "a".into(), tx);

        assert_eq!(handle.deliver("one"), Err(SendError::ChannelClosed));
    }
}
