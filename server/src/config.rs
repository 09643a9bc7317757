//! Server configuration
//!
//! Built from command-line arguments in `main.rs`; tests construct it
//! directly, usually with port 0 and a fixed seed.

use crate::error::ServerError;
use garden_shared::{MAX_SIDE, MIN_SIDE};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Default number of observer slots.
pub const DEFAULT_OBSERVER_CAPACITY: usize = 100;
/// Default time a single observer write may take before the observer is dropped.
pub const DEFAULT_OBSERVER_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address both listeners bind to
    pub host: String,
    /// Port for gardener connections
    pub task_port: u16,
    /// Port for observer connections; `None` means `task_port + 1`
    pub observer_port: Option<u16>,
    /// Grid side; the field is `2 * side` by `2 * side`
    pub side: i32,
    /// Seed for blocked plot placement, random when absent
    pub seed: Option<u64>,
    pub observer_capacity: usize,
    pub observer_write_timeout: Duration,
    /// How long shutdown waits for gardener sessions before abandoning them
    pub grace_period: Option<Duration>,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, task_port: u16, side: i32) -> Self {
        Self {
            host: host.into(),
            task_port,
            observer_port: None,
            side,
            seed: None,
            observer_capacity: DEFAULT_OBSERVER_CAPACITY,
            observer_write_timeout: DEFAULT_OBSERVER_WRITE_TIMEOUT,
            grace_period: None,
        }
    }

    /// Rejects grid sides outside `[MIN_SIDE, MAX_SIDE]`.
    pub fn validate(&self) -> Result<(), ServerError> {
        if !(MIN_SIDE..=MAX_SIDE).contains(&self.side) {
            return Err(ServerError::InvalidGridSize {
                side: self.side,
                min: MIN_SIDE,
                max: MAX_SIDE,
            });
        }
        Ok(())
    }

    /// Rows and columns of the field. Only meaningful after `validate`.
    pub fn dimensions(&self) -> (usize, usize) {
        let cells = (2 * self.side) as usize;
        (cells, cells)
    }

    pub fn task_addr(&self) -> Result<SocketAddr, ServerError> {
        self.socket_addr(self.task_port)
    }

    pub fn observer_addr(&self) -> Result<SocketAddr, ServerError> {
        let port = match self.observer_port {
            Some(port) => port,
            // Port 0 asks the OS for any free port, so keep it as is
            None if self.task_port == 0 => 0,
            None => self.task_port.checked_add(1).ok_or_else(|| {
                ServerError::InvalidAddress(format!(
                    "{}: no observer port after {}",
                    self.host, self.task_port
                ))
            })?,
        };
        self.socket_addr(port)
    }

    fn socket_addr(&self, port: u16) -> Result<SocketAddr, ServerError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ServerError::InvalidAddress(self.host.clone()))?;
        Ok(SocketAddr::new(ip, port))
    }
}
