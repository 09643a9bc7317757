//! Observer roster and broadcaster
//!
//! Observers are passive text subscribers. The roster has a fixed number of
//! slots guarded by one async mutex, separate from every zone lock. A broadcast
//! holds that mutex for the whole pass, so observers never see a slot change
//! halfway through a message.

use crate::error::RegistryError;
use garden_shared::OBSERVER_TERMINATOR;
use log::{info, warn};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// A registered observer connection.
struct Observer<O> {
    label: String,
    writer: O,
}

enum Slot<O> {
    Free,
    Active(Observer<O>),
}

impl<O> Slot<O> {
    fn is_active(&self) -> bool {
        matches!(self, Slot::Active(_))
    }
}

pub struct ObserverRegistry<O = TcpStream> {
    slots: Mutex<Vec<Slot<O>>>,
    capacity: usize,
    write_timeout: Duration,
}

impl<O: AsyncWrite + Unpin + Send> ObserverRegistry<O> {
    pub fn new(capacity: usize, write_timeout: Duration) -> Self {
        Self {
            slots: Mutex::new((0..capacity).map(|_| Slot::Free).collect()),
            capacity,
            write_timeout,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Installs the observer in the first free slot and returns its index.
    pub async fn register(
        &self,
        writer: O,
        label: impl Into<String>,
    ) -> Result<usize, RegistryError> {
        let mut slots = self.slots.lock().await;
        let index = slots
            .iter()
            .position(|slot| !slot.is_active())
            .ok_or(RegistryError::Full {
                capacity: self.capacity,
            })?;

        let label = label.into();
        info!("Observer {} registered in slot {}", label, index);
        slots[index] = Slot::Active(Observer { label, writer });
        Ok(index)
    }

    /// Sends `text` as one newline-terminated line to every active observer.
    ///
    /// An observer whose write fails or stalls past the write timeout is
    /// closed and its slot freed. Returns the number of observers reached.
    pub async fn broadcast(&self, text: &str) -> usize {
        let mut line = text.trim_end_matches('\n').to_string();
        line.push('\n');

        let mut slots = self.slots.lock().await;
        let mut delivered = 0;
        for slot in slots.iter_mut() {
            let Slot::Active(observer) = &mut *slot else {
                continue;
            };

            match self.send(&mut observer.writer, line.as_bytes()).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Dropping observer {}: {}", observer.label, e);
                    if let Slot::Active(observer) = std::mem::replace(slot, Slot::Free) {
                        self.close(observer).await;
                    }
                }
            }
        }
        delivered
    }

    /// Sends the terminator line to every active observer and closes them all.
    /// Returns the number of observers that were still active.
    pub async fn shutdown_all(&self) -> usize {
        let terminator = format!("{}\n", OBSERVER_TERMINATOR);

        let mut slots = self.slots.lock().await;
        let mut notified = 0;
        for slot in slots.iter_mut() {
            if let Slot::Active(mut observer) = std::mem::replace(slot, Slot::Free) {
                if let Err(e) = self.send(&mut observer.writer, terminator.as_bytes()).await {
                    warn!("Observer {} missed the shutdown notice: {}", observer.label, e);
                }
                self.close(observer).await;
                notified += 1;
            }
        }
        notified
    }

    pub async fn active_count(&self) -> usize {
        let slots = self.slots.lock().await;
        slots.iter().filter(|slot| slot.is_active()).count()
    }

    async fn send(&self, writer: &mut O, data: &[u8]) -> io::Result<()> {
        let write = async {
            writer.write_all(data).await?;
            writer.flush().await
        };
        match timeout(self.write_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "observer write timed out")),
        }
    }

    async fn close(&self, mut observer: Observer<O>) {
        // Best effort: the peer may already be gone
        let _ = timeout(self.write_timeout, observer.writer.shutdown()).await;
        info!("Observer {} closed", observer.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, AsyncBufReadExt, AsyncReadExt, BufReader, DuplexStream};

    /// Writer that always fails, standing in for a reset connection.
    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn registry(capacity: usize) -> ObserverRegistry<DuplexStream> {
        ObserverRegistry::new(capacity, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_register_until_full() {
        let registry = registry(2);
        let (_a, server_a) = duplex(64);
        let (_b, server_b) = duplex(64);
        let (_c, server_c) = duplex(64);

        assert_eq!(registry.register(server_a, "a").await, Ok(0));
        assert_eq!(registry.register(server_b, "b").await, Ok(1));
        assert_eq!(
            registry.register(server_c, "c").await,
            Err(RegistryError::Full { capacity: 2 })
        );
        assert_eq!(registry.active_count().await, 2);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_observer() {
        let registry = registry(4);
        let (client_a, server_a) = duplex(256);
        let (client_b, server_b) = duplex(256);
        registry.register(server_a, "a").await.unwrap();
        registry.register(server_b, "b").await.unwrap();

        assert_eq!(registry.broadcast("Gardener 1 takes (row: 0, col: 0) plot").await, 2);
        assert_eq!(registry.broadcast("multi\nline\n").await, 2);

        for client in [client_a, client_b] {
            let mut lines = BufReader::new(client).lines();
            assert_eq!(
                lines.next_line().await.unwrap().as_deref(),
                Some("Gardener 1 takes (row: 0, col: 0) plot")
            );
            assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("multi"));
            assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("line"));
        }
    }

    #[tokio::test]
    async fn test_failed_observer_is_dropped_and_slot_reused() {
        let registry: ObserverRegistry<Box<dyn AsyncWrite + Unpin + Send>> =
            ObserverRegistry::new(2, Duration::from_millis(200));
        let (client, server) = duplex(256);

        registry.register(Box::new(BrokenPipe), "broken").await.unwrap();
        registry.register(Box::new(server), "healthy").await.unwrap();

        assert_eq!(registry.broadcast("hello").await, 1);
        assert_eq!(registry.active_count().await, 1);

        // The broken observer's slot is the first free one again
        let (_late, late_server) = duplex(64);
        assert_eq!(registry.register(Box::new(late_server), "late").await, Ok(0));

        let mut lines = BufReader::new(client).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_stalled_observer_times_out() {
        let registry = registry(1);
        // Tiny buffer nobody reads from
        let (_client, server) = duplex(4);
        registry.register(server, "stalled").await.unwrap();

        assert_eq!(registry.broadcast("this line does not fit").await, 0);
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_late_observer_gets_no_replay() {
        let registry = registry(2);
        let (early, early_server) = duplex(256);
        registry.register(early_server, "early").await.unwrap();

        registry.broadcast("before").await;

        let (late, late_server) = duplex(256);
        registry.register(late_server, "late").await.unwrap();
        registry.broadcast("after").await;
        registry.shutdown_all().await;

        let mut early_text = String::new();
        BufReader::new(early).read_to_string(&mut early_text).await.unwrap();
        assert_eq!(early_text, "before\nafter\n0\n");

        let mut late_text = String::new();
        BufReader::new(late).read_to_string(&mut late_text).await.unwrap();
        assert_eq!(late_text, "after\n0\n");
    }

    #[tokio::test]
    async fn test_shutdown_all_notifies_and_frees_slots() {
        let registry = registry(3);
        let (mut client, server) = duplex(64);
        registry.register(server, "a").await.unwrap();

        assert_eq!(registry.shutdown_all().await, 1);
        assert_eq!(registry.active_count().await, 0);

        let mut text = String::new();
        client.read_to_string(&mut text).await.unwrap();
        assert_eq!(text, "0\n");
    }
}
