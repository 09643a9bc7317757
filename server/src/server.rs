//! Server context: owns the listeners and every shared resource

use crate::config::ServerConfig;
use crate::console::ConsoleSink;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::events::{event_channel, EventPump};
use crate::field::Field;
use crate::garden::Garden;
use crate::lifecycle::{Lifecycle, ShutdownReport};
use crate::observers::ObserverRegistry;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub struct Server {
    config: ServerConfig,
    task_listener: TcpListener,
    observer_listener: TcpListener,
    garden: Arc<Garden>,
    observers: Arc<ObserverRegistry>,
    shutdown: CancellationToken,
}

impl Server {
    /// Validates the configuration, binds both listeners and builds a fresh
    /// random field. Any failure here is fatal.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let task_listener = bind_listener(config.task_addr()?).await?;
        let observer_listener = bind_listener(config.observer_addr()?).await?;
        info!(
            "Gardeners on {}, observers on {}",
            task_listener.local_addr()?,
            observer_listener.local_addr()?
        );

        let (rows, columns) = config.dimensions();
        let field = Field::with_seed(rows, columns, config.seed);
        info!(
            "Field {}x{} with {} blocked plots",
            rows,
            columns,
            field.blocked_count()
        );

        let observers = Arc::new(ObserverRegistry::new(
            config.observer_capacity,
            config.observer_write_timeout,
        ));

        Ok(Self {
            config,
            task_listener,
            observer_listener,
            garden: Arc::new(Garden::new(field)),
            observers,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn task_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.task_listener.local_addr()?)
    }

    pub fn observer_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.observer_listener.local_addr()?)
    }

    pub fn garden(&self) -> Arc<Garden> {
        Arc::clone(&self.garden)
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serves gardeners and observers until the shutdown token fires, then
    /// shuts down gracefully.
    pub async fn run(self) -> ShutdownReport {
        let (events, rx) = event_channel();
        let pump = tokio::spawn(
            EventPump::new(rx, ConsoleSink::stdout(), Arc::clone(&self.observers)).run(),
        );

        events.map(&self.garden.field);

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.garden),
            events.clone(),
            self.shutdown.clone(),
        );
        let (sessions, ()) = tokio::join!(
            dispatcher.accept_gardeners(self.task_listener),
            dispatcher.accept_observers(self.observer_listener, Arc::clone(&self.observers)),
        );
        drop(dispatcher);

        Lifecycle::new(self.config.grace_period)
            .shutdown(sessions, events, pump, self.observers)
            .await
    }
}

async fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}
