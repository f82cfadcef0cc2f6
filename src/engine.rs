//! Relay engine (composition root)
//!
//! Owns the registry and the broadcast relay, and turns each accepted
//! byte stream into a running session: writer task, idle monitor and the
//! read loop, torn down exactly once.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcaster::Broadcaster;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::handler::{line_reader, read_loop, write_loop, ReadEnd, FLUSH_GRACE};
use crate::idle::{IdleMonitor, MonitorOutcome};
use crate::message::ServerNotice;
use crate::registry::Registry;
use crate::session::Session;
use crate::types::{SessionId, TeardownReason};

/// The relay engine
///
/// Cheap to clone; every clone serves connections into the same registry.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Registry,
    broadcaster: Broadcaster,
    config: Arc<RelayConfig>,
}

impl Engine {
    /// Create the registry and start the broadcast relay
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: RelayConfig) -> Self {
        let registry = Registry::new();
        let (broadcaster, _relay) = Broadcaster::spawn(registry.clone(), config.relay_capacity);
        info!(
            "Relay engine started (idle timeout {:?})",
            config.idle_timeout()
        );
        Self {
            registry,
            broadcaster,
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Serve one accepted connection until it ends
    ///
    /// Returns how the session ended, or `NameTaken` if its address-derived
    /// name was already in use and the connection was refused.
    pub async fn serve_connection<S>(
        &self,
        stream: S,
        remote_addr: String,
    ) -> Result<TeardownReason, RelayError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let mut lines = line_reader(reader, self.config.max_line_length);
        let sink = FramedWrite::new(writer, LinesCodec::new());

        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_capacity);
        let shutdown = CancellationToken::new();
        let write_task = tokio::spawn(write_loop(sink, outbound_rx, shutdown.clone()));

        let id = SessionId::new();
        let mut session = Session::new(
            id,
            remote_addr,
            outbound_tx.clone(),
            self.registry.clone(),
            self.broadcaster.clone(),
        );

        if let Err(e) = session.online().await {
            warn!("Refusing {} from {}: {}", id, session.addr(), e);
            if matches!(e, RelayError::NameTaken(_)) {
                let _ = session.notify(ServerNotice::NameTaken).await;
            } else {
                // Registered but the relay is gone
                session.offline(TeardownReason::Failed).await;
            }
            shutdown.cancel();
            join_writer(write_task).await;
            return Err(e);
        }

        let (monitor, liveness) =
            IdleMonitor::new(self.config.idle_timeout(), outbound_tx, shutdown.clone());
        let monitor_task = tokio::spawn(monitor.run());

        let ended = read_loop(&mut session, &mut lines, &liveness, &shutdown).await;
        shutdown.cancel();

        let evicted = matches!(monitor_task.await, Ok(MonitorOutcome::Evicted));
        let reason = match ended {
            _ if evicted => TeardownReason::Evicted,
            ReadEnd::Failed => TeardownReason::Failed,
            // Cancelled without eviction: the writer hit a dead stream
            ReadEnd::PeerClosed | ReadEnd::Cancelled => TeardownReason::PeerClosed,
        };

        session.offline(reason).await;
        drop(session);
        join_writer(write_task).await;

        info!("Session {} ended: {:?}", id, reason);
        debug!("Sessions online: {}", self.registry.len());
        Ok(reason)
    }
}

/// Wait for the writer to finish its flush, aborting it if it overstays
async fn join_writer(mut write_task: JoinHandle<()>) {
    if timeout(FLUSH_GRACE * 2, &mut write_task).await.is_err() {
        warn!("Write task did not finish in time, aborting");
        write_task.abort();
    }
}
