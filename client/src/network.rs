use crate::error::ClientError;
use crate::sweep::SweepOrder;
use garden_shared::{read_message, write_message, Ack, FieldSize, Task};
use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// A gardener connected to the server.
pub struct GardenerClient<S = TcpStream> {
    stream: S,
    field: FieldSize,
    gardener_id: i32,
    working_time_ms: i32,
}

impl GardenerClient<TcpStream> {
    pub async fn connect(
        server_addr: &str,
        gardener_id: i32,
        working_time_ms: i32,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(server_addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: server_addr.to_string(),
                source,
            })?;
        info!("Connected to {}", server_addr);
        Self::from_stream(stream, gardener_id, working_time_ms).await
    }
}

impl<S> GardenerClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an open connection and reads the field size the server sends first.
    pub async fn from_stream(
        mut stream: S,
        gardener_id: i32,
        working_time_ms: i32,
    ) -> Result<Self, ClientError> {
        let field: FieldSize = read_message(&mut stream).await?;
        debug!("Field is {}x{}", field.rows, field.columns);
        Ok(Self {
            stream,
            field,
            gardener_id,
            working_time_ms,
        })
    }

    pub fn field(&self) -> FieldSize {
        self.field
    }

    /// Sends `task` until the server acknowledges it with `1`.
    ///
    /// The number of resends is unbounded. A server that keeps answering
    /// with anything but `1` keeps this loop spinning; only I/O errors end it.
    pub async fn submit(&mut self, task: Task) -> Result<(), ClientError> {
        loop {
            write_message(&mut self.stream, &task).await?;
            let ack: Ack = read_message(&mut self.stream).await?;
            if ack.is_ok() {
                return Ok(());
            }
            debug!("Server answered {} to {:?}, resending", ack.0, task);
        }
    }

    pub async fn work_plot(&mut self, row: i32, col: i32) -> Result<(), ClientError> {
        let task = Task::plot(row, col, self.gardener_id, self.working_time_ms);
        self.submit(task).await?;
        println!("Gardener {} at row: {}, col: {}", self.gardener_id, row, col);
        Ok(())
    }

    /// Sends the finishing task and closes the connection.
    pub async fn finish(mut self) -> Result<(), ClientError> {
        let task = Task::finished(self.gardener_id, self.working_time_ms);
        self.submit(task).await?;
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Works every plot in `order`, then finishes. Returns the plots worked.
    pub async fn run_sweep(mut self, order: SweepOrder) -> Result<usize, ClientError> {
        let plots = order.plots(self.field.rows, self.field.columns);
        for &(row, col) in &plots {
            self.work_plot(row, col).await?;
        }
        self.finish().await?;
        Ok(plots.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garden_shared::encode;

    fn field_size(rows: i32, columns: i32) -> Vec<u8> {
        encode(&FieldSize { rows, columns }).unwrap()
    }

    fn ack(value: i32) -> Vec<u8> {
        encode(&Ack(value)).unwrap()
    }

    #[tokio::test]
    async fn test_submit_resends_until_acknowledged() {
        let task = Task::plot(0, 1, 3, 50);
        let stream = tokio_test::io::Builder::new()
            .read(&field_size(4, 4))
            .write(&encode(&task).unwrap())
            .read(&ack(0))
            .write(&encode(&task).unwrap())
            .read(&ack(1))
            .build();

        let mut client = GardenerClient::from_stream(stream, 3, 50).await.unwrap();
        assert_eq!(
            client.field(),
            FieldSize {
                rows: 4,
                columns: 4
            }
        );
        client.submit(task).await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_sends_every_plot_then_finishes() {
        let mut builder = tokio_test::io::Builder::new();
        builder.read(&field_size(2, 2));
        for (row, col) in SweepOrder::Rows.plots(2, 2) {
            builder
                .write(&encode(&Task::plot(row, col, 1, 0)).unwrap())
                .read(&ack(1));
        }
        builder
            .write(&encode(&Task::finished(1, 0)).unwrap())
            .read(&ack(1));

        let client = GardenerClient::from_stream(builder.build(), 1, 0)
            .await
            .unwrap();
        assert_eq!(client.run_sweep(SweepOrder::Rows).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_lost_server_is_reported() {
        let task = Task::plot(2, 2, 1, 10);
        let stream = tokio_test::io::Builder::new()
            .read(&field_size(4, 4))
            .write(&encode(&task).unwrap())
            .build();
        let mut client = GardenerClient::from_stream(stream, 1, 10).await.unwrap();

        // Connection closes before the ack arrives
        let result = client.submit(task).await;
        assert!(matches!(result, Err(ClientError::Wire(_))));
    }

    #[tokio::test]
    async fn test_missing_field_size_fails() {
        let stream = tokio_test::io::Builder::new().read(&[1, 0, 0]).build();
        let result = GardenerClient::from_stream(stream, 1, 10).await;
        assert!(matches!(result, Err(ClientError::Wire(_))));
    }
}
