//! Broadcast relay actor
//!
//! All publishes funnel through one `mpsc` queue drained by a single relay
//! task, which fans each message out to a registry snapshot. The relay is
//! the ordering point: every session sees published messages in the order
//! the relay received them.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RelayError, SendError};
use crate::registry::Registry;

/// Publishing side of the relay
///
/// Clone freely; the relay runs until every clone is dropped.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    sender: mpsc::Sender<String>,
}

impl Broadcaster {
    /// Start the relay task over `registry`
    pub fn spawn(registry: Registry, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let relay = Relay::new(registry, receiver);
        (Self { sender }, tokio::spawn(relay.run()))
    }

    /// Queue a formatted message for every online session
    ///
    /// Waits if the relay queue is full; the relay itself never waits on a
    /// recipient.
    pub async fn publish(&self, message: String) -> Result<(), RelayError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| RelayError::ChannelSend)
    }
}

/// The single consumer behind `Broadcaster`
pub struct Relay {
    registry: Registry,
    receiver: mpsc::Receiver<String>,
}

impl Relay {
    pub fn new(registry: Registry, receiver: mpsc::Receiver<String>) -> Self {
        Self { registry, receiver }
    }

    /// Run the relay loop until all publishers are dropped
    pub async fn run(mut self) {
        info!("Broadcast relay started");

        while let Some(message) = self.receiver.recv().await {
            let delivered = self.fan_out(&message);
            debug!("Relayed to {} sessions: {}", delivered, message);
        }

        info!("Broadcast relay shutting down");
    }

    /// Push one message onto every registered session's queue
    ///
    /// A full queue drops the message for that recipient only.
    fn fan_out(&self, message: &str) -> usize {
        let mut delivered = 0;
        for session in self.registry.snapshot() {
            match session.deliver(message) {
                Ok(()) => delivered += 1,
                Err(SendError::QueueFull) => {
                    warn!(
                        "Outbound queue full for '{}', dropping broadcast",
                        session.name
                    );
                }
                Err(SendError::ChannelClosed) => {
                    debug!("Session '{}' is closing, skipped", session.name);
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionHandle;
    use crate::types::SessionId;
    use std::time::Duration;
    use tokio::time::timeout;

    fn join(registry: &Registry, name: &str, capacity: usize) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(capacity);
        registry
            .register(SessionHandle::new(
                SessionId::new(),
                name.to_string(),
                name.to_string(),
                tx,
            ))
            .unwrap();
        rx
    }

    async fn recv(rx: &mut mpsc::Receiver<String>) -> String {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("queue closed")
    }

    #[tokio::test]
    async fn test_publish_reaches_every_session() {
        let registry = Registry::new();
        let mut a = join(&registry, "a", 8);
        let mut b = join(&registry, "b", 8);
        let mut c = join(&registry, "c", 8);
        let (broadcaster, _relay) = Broadcaster::spawn(registry.clone(), 8);

        broadcaster.publish("[x]a:hi".to_string()).await.unwrap();

        assert_eq!(recv(&mut a).await, "[x]a:hi");
        assert_eq!(recv(&mut b).await, "[x]a:hi");
        assert_eq!(recv(&mut c).await, "[x]a:hi");
    }

    #[tokio::test]
    async fn test_publish_order_preserved() {
        let registry = Registry::new();
        let mut a = join(&registry, "a", 64);
        let mut b = join(&registry, "b", 64);
        let (broadcaster, _relay) = Broadcaster::spawn(registry.clone(), 4);

        for i in 0..32 {
            broadcaster.publish(format!("m{}", i)).await.unwrap();
        }

        for i in 0..32 {
            assert_eq!(recv(&mut a).await, format!("m{}", i));
            assert_eq!(recv(&mut b).await, format!("m{}", i));
        }
    }

    #[tokio::test]
    async fn test_slow_consumer_does_not_stall_others() {
        let registry = Registry::new();
        let mut fast = join(&registry, "fast", 64);
        // Never drained
        let _slow = join(&registry, "slow", 1);
        let (broadcaster, _relay) = Broadcaster::spawn(registry.clone(), 4);

        for i in 0..10 {
            broadcaster.publish(format!("m{}", i)).await.unwrap();
        }

        for i in 0..10 {
            assert_eq!(recv(&mut fast).await, format!("m{}", i));
        }
    }

    #[tokio::test]
    async fn test_relay_stops_when_publishers_dropped() {
        let registry = Registry::new();
        let (broadcaster, relay) = Broadcaster::spawn(registry, 4);
        drop(broadcaster);

        timeout(Duration::from_secs(2), relay)
            .await
            .expect("relay did not stop")
            .unwrap();
    }
}
