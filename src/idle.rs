//! Per-session inactivity watchdog
//!
//! Races a liveness signal against a timeout alarm. Liveness is polled
//! first, so a line that arrives just as the alarm fires still counts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::RelayError;
use crate::message::ServerNotice;

/// How the watchdog ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// The window elapsed with no inbound line
    Evicted,
    /// The session ended some other way first
    Stopped,
}

/// Handle used by the read loop to report inbound activity
#[derive(Debug, Clone, Default)]
pub struct Liveness(Arc<Notify>);

impl Liveness {
    /// Record inbound activity, resetting the idle window
    pub fn touch(&self) {
        // Stores a permit if the monitor is not currently waiting
        self.0.notify_one();
    }
}

/// Idle watchdog for one session
pub struct IdleMonitor {
    window: Duration,
    liveness: Liveness,
    outbound: mpsc::Sender<String>,
    shutdown: CancellationToken,
}

impl IdleMonitor {
    /// Create a monitor and the liveness handle that feeds it
    pub fn new(
        window: Duration,
        outbound: mpsc::Sender<String>,
        shutdown: CancellationToken,
    ) -> (Self, Liveness) {
        let liveness = Liveness::default();
        let monitor = Self {
            window,
            liveness: liveness.clone(),
            outbound,
            shutdown,
        };
        (monitor, liveness)
    }

    /// Watch until the session goes idle or is shut down
    ///
    /// On eviction the forced-logout notice is queued before the session's
    /// shutdown token is cancelled, so the writer flushes it before closing.
    pub async fn run(self) -> MonitorOutcome {
        loop {
            tokio::select! {
                biased;
                _ = self.liveness.0.notified() => {
                    continue;
                }
                _ = self.shutdown.cancelled() => {
                    debug!("Idle monitor stopped");
                    return MonitorOutcome::Stopped;
                }
                _ = sleep(self.window) => {
                    break;
                }
            }
        }

        let reason = RelayError::IdleTimeout;
        info!("{} after {:?}, evicting", reason, self.window);
        let notice = String::from(ServerNotice::from(reason));
        if timeout(self.window, self.outbound.send(notice)).await.is_err() {
            debug!("Forced-logout notice could not be queued in time");
        }
        self.shutdown.cancel();
        MonitorOutcome::Evicted
    }
}
