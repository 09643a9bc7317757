use crate::events::{Event, EventKind};
use log::{debug, warn};
use std::io::{self, Stdout, Write};

/// Operator console. Prints maps and status notes, logs actions at debug level.
pub struct ConsoleSink<W> {
    out: W,
}

impl ConsoleSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn handle(&mut self, event: &Event) {
        let result = match event.kind {
            EventKind::Map => writeln!(self.out, "{}\n{}", event.timestamp, event.text),
            EventKind::StatusInfo => writeln!(self.out, "[{}] {}", event.timestamp, event.text),
            EventKind::Action => {
                debug!("[{}] {}", event.timestamp, event.text);
                return;
            }
        };

        if let Err(e) = result.and_then(|_| self.out.flush()) {
            warn!("Console write failed: {}", e);
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
