use crate::error::ClientError;
use garden_shared::OBSERVER_TERMINATOR;
use log::{debug, info};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::net::TcpStream;

/// Passive subscriber to the server's event stream.
pub struct ObserverClient<R = TcpStream> {
    lines: Lines<BufReader<R>>,
}

impl ObserverClient<TcpStream> {
    pub async fn connect(server_addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(server_addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: server_addr.to_string(),
                source,
            })?;
        info!("Observing {}", server_addr);
        Ok(Self::from_reader(stream))
    }
}

impl<R: AsyncRead + Unpin> ObserverClient<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Next line pushed by the server, or `None` once the stream has ended
    /// either by closing or by sending the terminator line.
    pub async fn next_line(&mut self) -> Result<Option<String>, ClientError> {
        match self.lines.next_line().await? {
            Some(line) if line.trim_end() == OBSERVER_TERMINATOR => {
                debug!("Server sent terminator");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Copies every line to `out` until the stream ends. Returns the line count.
    pub async fn run<W: Write>(mut self, out: &mut W) -> Result<usize, ClientError> {
        let mut count = 0;
        while let Some(line) = self.next_line().await? {
            writeln!(out, "{}", line)?;
            count += 1;
        }
        out.flush()?;
        Ok(count)
    }
}
