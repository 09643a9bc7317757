//! Event bus between gardener sessions and the operator outputs
//!
//! Every session and the dispatcher hold an `EventPublisher`. A single
//! `EventPump` task drains the channel in enqueue order and hands each event to
//! the console and then to the observer roster, so both see one global order.

use crate::console::ConsoleSink;
use crate::field::Field;
use crate::observers::ObserverRegistry;
use chrono::Local;
use garden_shared::MAX_EVENT_TEXT;
use log::{debug, info};
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Full field snapshot
    Map,
    /// Narration of a gardener touching a plot
    Action,
    /// Connection lifecycle note
    StatusInfo,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Map => "MAP",
            EventKind::Action => "ACTION",
            EventKind::StatusInfo => "STATUS_INFO",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub timestamp: String,
    pub kind: EventKind,
    pub text: String,
}

impl Event {
    /// Stamps the event with the local time and caps the text at
    /// `MAX_EVENT_TEXT` bytes.
    pub fn new(kind: EventKind, text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            kind,
            text: truncate_text(text.into()),
        }
    }
}

fn truncate_text(mut text: String) -> String {
    if text.len() > MAX_EVENT_TEXT {
        let mut end = MAX_EVENT_TEXT;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

/// Creates the bus. The receiving half goes to the `EventPump`.
pub fn event_channel() -> (EventPublisher, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let publisher = EventPublisher {
        tx,
        map_order: Arc::new(Mutex::new(())),
    };
    (publisher, rx)
}

#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::UnboundedSender<Event>,
    /// Held from snapshot to enqueue, so maps are queued in snapshot order
    map_order: Arc<Mutex<()>>,
}

impl EventPublisher {
    /// Enqueues an event. Returns false once the pump has gone away.
    pub fn publish(&self, event: Event) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                debug!("Dropping {} event, bus closed: {}", event.kind, event.text);
                false
            }
        }
    }

    /// Snapshots `field` and enqueues the map. Every queued map includes all
    /// claims made before the one queued ahead of it.
    pub fn map(&self, field: &Field) -> bool {
        let _order = self.map_order.lock().unwrap_or_else(PoisonError::into_inner);
        self.publish(Event::new(EventKind::Map, field.snapshot().to_string()))
    }

    pub fn action(&self, text: impl Into<String>) -> bool {
        self.publish(Event::new(EventKind::Action, text))
    }

    pub fn status(&self, text: impl Into<String>) -> bool {
        self.publish(Event::new(EventKind::StatusInfo, text))
    }
}

/// The single consumer of the bus.
pub struct EventPump<W, O> {
    events: mpsc::UnboundedReceiver<Event>,
    console: ConsoleSink<W>,
    observers: Arc<ObserverRegistry<O>>,
}

impl<W, O> EventPump<W, O>
where
    W: Write,
    O: AsyncWrite + Unpin + Send,
{
    pub fn new(
        events: mpsc::UnboundedReceiver<Event>,
        console: ConsoleSink<W>,
        observers: Arc<ObserverRegistry<O>>,
    ) -> Self {
        Self {
            events,
            console,
            observers,
        }
    }

    /// Delivers events until every publisher is dropped and the queue is
    /// empty. Returns the number of events delivered.
    pub async fn run(mut self) -> u64 {
        let mut delivered = 0;
        while let Some(event) = self.events.recv().await {
            self.console.handle(&event);
            self.observers.broadcast(&event.text).await;
            delivered += 1;
        }
        info!("Event bus drained after {} events", delivered);
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[test]
    fn test_event_text_is_bounded() {
        let event = Event::new(EventKind::Action, "a".repeat(MAX_EVENT_TEXT + 10));
        assert_eq!(event.text.len(), MAX_EVENT_TEXT);

        // Multi-byte characters are never split
        let event = Event::new(EventKind::Action, "é".repeat(MAX_EVENT_TEXT));
        assert!(event.text.len() <= MAX_EVENT_TEXT);
        assert!(event.text.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_timestamp_format() {
        let event = Event::new(EventKind::StatusInfo, "hello");
        // YYYY-MM-DD HH:MM:SS
        assert_eq!(event.timestamp.len(), 19);
        assert_eq!(&event.timestamp[4..5], "-");
        assert_eq!(&event.timestamp[10..11], " ");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(EventKind::Map.to_string(), "MAP");
        assert_eq!(EventKind::Action.to_string(), "ACTION");
        assert_eq!(EventKind::StatusInfo.to_string(), "STATUS_INFO");
    }

    #[test]
    fn test_per_producer_order_is_preserved() {
        let (publisher, mut rx) = event_channel();
        let other = publisher.clone();

        publisher.action("a1");
        other.action("b1");
        publisher.action("a2");
        other.action("b2");

        let texts: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.text)
            .collect();
        assert_eq!(texts, vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn test_publish_after_close_reports_failure() {
        let (publisher, rx) = event_channel();
        drop(rx);
        assert!(!publisher.status("nobody listening"));
    }

    #[tokio::test]
    async fn test_pump_drains_then_stops() {
        let (publisher, rx) = event_channel();
        let registry = Arc::new(ObserverRegistry::new(4, Duration::from_secs(1)));
        let pump = EventPump::new(rx, ConsoleSink::new(Vec::new()), Arc::clone(&registry));

        let (observer_side, server_side) = tokio::io::duplex(4096);
        registry.register(server_side, "test").await.unwrap();

        publisher.status("first");
        publisher.action("second");
        drop(publisher);

        assert_eq!(pump.run().await, 2);

        let mut lines = BufReader::new(observer_side).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("second"));
    }
}
