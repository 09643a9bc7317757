//! Error types for the garden server
//!
//! Startup errors abort the process before any connection is accepted.
//! Session and registry errors stay contained in the task that hit them.

use garden_shared::WireError;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Fatal errors raised while building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("grid side must be in [{min}, {max}], got {side}")]
    InvalidGridSize { side: i32, min: i32, max: i32 },
    #[error("invalid listen address {0}")]
    InvalidAddress(String),
    #[error("unable to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Reasons a gardener session ends early.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    ConnectionLost(#[from] WireError),
    #[error("plot (row: {row}, col: {col}) is outside the {rows}x{columns} field")]
    PlotOutOfBounds {
        row: i32,
        col: i32,
        rows: usize,
        columns: usize,
    },
    #[error("negative working time {0}ms")]
    NegativeWorkingTime(i32),
    #[error("gardener id {0} is not positive")]
    InvalidGardenerId(i32),
    #[error("plot step failed: {0}")]
    StepFailed(#[from] tokio::task::JoinError),
}

impl SessionError {
    /// True when the peer went away, as opposed to sending a bad task.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, SessionError::ConnectionLost(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("observer roster is full ({capacity} slots)")]
    Full { capacity: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_grid_size_message() {
        let err = ServerError::InvalidGridSize {
            side: 11,
            min: 2,
            max: 10,
        };
        assert_eq!(err.to_string(), "grid side must be in [2, 10], got 11");
    }

    #[test]
    fn test_disconnect_classification() {
        let lost = SessionError::ConnectionLost(WireError::ConnectionLost(io::Error::from(
            io::ErrorKind::UnexpectedEof,
        )));
        assert!(lost.is_disconnect());
        assert!(!SessionError::NegativeWorkingTime(-5).is_disconnect());
        assert!(!SessionError::InvalidGardenerId(0).is_disconnect());
    }
}
