//! Accept loops for gardener and observer connections

use crate::events::EventPublisher;
use crate::garden::Garden;
use crate::observers::ObserverRegistry;
use crate::session::{SessionOutcome, TaskSession};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

pub struct Dispatcher {
    garden: Arc<Garden>,
    events: EventPublisher,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(garden: Arc<Garden>, events: EventPublisher, shutdown: CancellationToken) -> Self {
        Self {
            garden,
            events,
            shutdown,
        }
    }

    /// Accepts gardeners until shutdown, one session task per connection.
    ///
    /// Finished sessions are reaped as they complete; the ones still running
    /// when shutdown fires are handed back for the lifecycle to wait on. The
    /// listener is closed on return.
    pub async fn accept_gardeners(&self, listener: TcpListener) -> JoinSet<SessionOutcome> {
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_session(&mut sessions, stream, addr),
                    Err(e) => {
                        error!("Failed to accept gardener connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },

                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    log_session_result(joined);
                }
            }
        }

        info!(
            "Stopped accepting gardeners, {} sessions still running",
            sessions.len()
        );
        sessions
    }

    /// Accepts observers until shutdown and adds them to the roster.
    /// Connections beyond the roster capacity are dropped.
    pub async fn accept_observers(
        &self,
        listener: TcpListener,
        observers: Arc<ObserverRegistry<TcpStream>>,
    ) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => match observers.register(stream, addr.to_string()).await {
                        Ok(_) => {
                            self.events.status(format!("Observer connected from {}", addr));
                        }
                        Err(e) => warn!("Rejecting observer {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Failed to accept observer connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
            }
        }

        info!("Stopped accepting observers");
    }

    fn spawn_session(
        &self,
        sessions: &mut JoinSet<SessionOutcome>,
        stream: TcpStream,
        addr: SocketAddr,
    ) {
        info!("Gardener connected from {}", addr);
        self.events
            .status(format!("New gardener connection from {}", addr));

        let session = TaskSession::new(
            stream,
            addr.to_string(),
            Arc::clone(&self.garden),
            self.events.clone(),
            self.shutdown.clone(),
        );
        sessions.spawn(session.run());
    }
}

pub(crate) fn log_session_result(result: Result<SessionOutcome, JoinError>) {
    match result {
        Ok(outcome) => debug!("Session ended: {:?}", outcome),
        Err(e) if e.is_cancelled() => debug!("Session abandoned"),
        Err(e) => error!("Session task panicked: {}", e),
    }
}
