//! Graceful shutdown
//!
//! Runs once the shutdown token has fired and both accept loops have
//! returned. The order matters: sessions go first so their last events reach
//! the bus, then the bus is drained, then observers get the terminator.

use crate::dispatcher::log_session_result;
use crate::events::EventPublisher;
use crate::observers::ObserverRegistry;
use crate::session::SessionOutcome;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    pub sessions_joined: usize,
    pub sessions_abandoned: usize,
    pub events_delivered: u64,
    pub observers_notified: usize,
}

pub struct Lifecycle {
    grace_period: Option<Duration>,
}

impl Lifecycle {
    pub fn new(grace_period: Option<Duration>) -> Self {
        Self { grace_period }
    }

    /// Waits for sessions, drains the event bus and closes every observer.
    ///
    /// Sessions waiting on their socket end as soon as they see the token.
    /// Sessions inside a plot step finish it first. With a grace period,
    /// sessions still running when it expires are aborted. A plot step runs on
    /// its own task, so it still completes and publishes its map before the
    /// event bus drains.
    pub async fn shutdown<O>(
        &self,
        mut sessions: JoinSet<SessionOutcome>,
        events: EventPublisher,
        pump: JoinHandle<u64>,
        observers: Arc<ObserverRegistry<O>>,
    ) -> ShutdownReport
    where
        O: AsyncWrite + Unpin + Send,
    {
        let mut report = ShutdownReport::default();

        match self.grace_period {
            Some(limit) => {
                let waited = timeout(limit, join_sessions(&mut sessions, &mut report)).await;
                if waited.is_err() {
                    report.sessions_abandoned = sessions.len();
                    warn!(
                        "Abandoning {} sessions after {:?}",
                        report.sessions_abandoned, limit
                    );
                    sessions.abort_all();
                    while let Some(joined) = sessions.join_next().await {
                        log_session_result(joined);
                    }
                }
            }
            None => join_sessions(&mut sessions, &mut report).await,
        }

        events.status("Server stopped");
        drop(events);

        report.events_delivered = match pump.await {
            Ok(delivered) => delivered,
            Err(e) => {
                error!("Event pump failed: {}", e);
                0
            }
        };

        report.observers_notified = observers.shutdown_all().await;
        info!("Shutdown complete: {:?}", report);
        report
    }
}

async fn join_sessions(sessions: &mut JoinSet<SessionOutcome>, report: &mut ShutdownReport) {
    while let Some(joined) = sessions.join_next().await {
        log_session_result(joined);
        report.sessions_joined += 1;
    }
}
