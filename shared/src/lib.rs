//! Wire types shared by the garden server and its clients.
//!
//! The primary protocol exchanges fixed-size structs of `i32` fields. They are
//! encoded with bincode's default fixed-int little-endian layout, which matches
//! the raw in-memory layout of a packed C struct on the supported targets.

use bincode::{deserialize, serialize};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Smallest accepted grid side; the field is `2 * side` cells wide.
pub const MIN_SIDE: i32 = 2;
/// Largest accepted grid side.
pub const MAX_SIDE: i32 = 10;
/// Width and height of a zone in cells.
pub const ZONE_SIDE: usize = 2;

/// Cell value of a plot nobody has claimed yet.
pub const UNTOUCHED: i32 = 0;
/// Cell value of a plot that can never be worked.
pub const BLOCKED: i32 = -1;

/// Acknowledgement value the server sends after handling a task.
pub const ACK_OK: i32 = 1;

/// Control line telling an observer the server is going away.
pub const OBSERVER_TERMINATOR: &str = "0";

/// Upper bound on the text payload of a single event, in bytes.
pub const MAX_EVENT_TEXT: usize = 1024;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("connection lost: {0}")]
    ConnectionLost(#[from] io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("encoded {actual} bytes, expected {expected}")]
    Size { expected: usize, actual: usize },
}

/// A message with a fixed encoded size on the primary protocol.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Exact number of bytes on the wire.
    const WIRE_LEN: usize;
}

/// Field dimensions, sent once by the server when a gardener connects.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct FieldSize {
    pub rows: i32,
    pub columns: i32,
}

impl WireMessage for FieldSize {
    const WIRE_LEN: usize = 8;
}

/// One claim request from a gardener.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub row: i32,
    pub col: i32,
    pub gardener_id: i32,
    pub working_time_ms: i32,
    pub done: i32,
}

impl Task {
    /// Request to work the plot at `(row, col)`.
    pub fn plot(row: i32, col: i32, gardener_id: i32, working_time_ms: i32) -> Self {
        Self {
            row,
            col,
            gardener_id,
            working_time_ms,
            done: 0,
        }
    }

    /// Sentinel task closing a gardener's session. Carries no plot.
    pub fn finished(gardener_id: i32, working_time_ms: i32) -> Self {
        Self {
            row: -1,
            col: -1,
            gardener_id,
            working_time_ms,
            done: 1,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done == 1
    }
}

impl WireMessage for Task {
    const WIRE_LEN: usize = 20;
}

/// Server reply to a task.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Ack(pub i32);

impl Ack {
    pub fn ok() -> Self {
        Ack(ACK_OK)
    }

    pub fn is_ok(&self) -> bool {
        self.0 == ACK_OK
    }
}

impl WireMessage for Ack {
    const WIRE_LEN: usize = 4;
}

/// Encodes a message, checking it has the protocol's fixed size.
pub fn encode<M: WireMessage>(message: &M) -> Result<Vec<u8>, WireError> {
    let data = serialize(message)?;
    if data.len() != M::WIRE_LEN {
        return Err(WireError::Size {
            expected: M::WIRE_LEN,
            actual: data.len(),
        });
    }
    Ok(data)
}

pub fn decode<M: WireMessage>(data: &[u8]) -> Result<M, WireError> {
    if data.len() != M::WIRE_LEN {
        return Err(WireError::Size {
            expected: M::WIRE_LEN,
            actual: data.len(),
        });
    }
    Ok(deserialize(data)?)
}

/// Writes exactly one message. A partial write surfaces as `ConnectionLost`.
pub async fn write_message<W, M>(writer: &mut W, message: &M) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    M: WireMessage,
{
    let data = encode(message)?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads exactly one message. Fewer bytes than `WIRE_LEN` before EOF is a
/// lost connection.
pub async fn read_message<R, M>(reader: &mut R) -> Result<M, WireError>
where
    R: AsyncRead + Unpin,
    M: WireMessage,
{
    let mut buffer = vec![0u8; M::WIRE_LEN];
    reader.read_exact(&mut buffer).await?;
    decode(&buffer)
}
