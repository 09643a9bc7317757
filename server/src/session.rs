//! Per-connection gardener session
//!
//! Each accepted gardener gets one `TaskSession` running on its own tokio
//! task. The session sends the field size, then loops receiving tasks and
//! working plots under the plot's zone lock until the gardener sends the
//! finishing task.
//!
//! Shutdown is only observed while waiting on the socket. Once a zone lock is
//! taken the plot step always runs to completion, so a cancelled session never
//! leaves a zone locked or a plot half-worked.

use crate::error::SessionError;
use crate::events::EventPublisher;
use crate::field::Plot;
use crate::garden::Garden;
use garden_shared::{read_message, write_message, Ack, Task};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitTask,
    Processing(Task),
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The gardener sent its finishing task and got the last acknowledgement.
    Finished {
        plots_worked: usize,
        plots_claimed: usize,
    },
    ConnectionLost,
    /// The gardener sent a task the field cannot serve.
    Rejected,
    /// Server shutdown interrupted the session while it waited on the socket.
    Cancelled,
}

pub struct TaskSession<S> {
    stream: S,
    peer: String,
    garden: Arc<Garden>,
    events: EventPublisher,
    shutdown: CancellationToken,
    gardener_id: Option<i32>,
    plots_worked: usize,
    plots_claimed: usize,
}

impl<S> TaskSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        garden: Arc<Garden>,
        events: EventPublisher,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            stream,
            peer: peer.into(),
            garden,
            events,
            shutdown,
            gardener_id: None,
            plots_worked: 0,
            plots_claimed: 0,
        }
    }

    /// Runs the session to its end and closes the connection.
    pub async fn run(mut self) -> SessionOutcome {
        let outcome = match self.drive().await {
            Ok(outcome) => outcome,
            Err(err) => {
                let who = self.describe();
                warn!("Session with {} ended: {}", who, err);
                if err.is_disconnect() {
                    self.events
                        .status(format!("Connection with gardener {} lost", who));
                    SessionOutcome::ConnectionLost
                } else {
                    self.events
                        .status(format!("Dropping gardener {}: {}", who, err));
                    SessionOutcome::Rejected
                }
            }
        };

        if let Err(e) = self.stream.shutdown().await {
            debug!("Closing connection with {}: {}", self.peer, e);
        }
        outcome
    }

    async fn drive(&mut self) -> Result<SessionOutcome, SessionError> {
        let shutdown = self.shutdown.clone();
        let size = self.garden.field.size();
        match cancellable(&shutdown, write_message(&mut self.stream, &size)).await {
            Some(result) => result?,
            None => return Ok(SessionOutcome::Cancelled),
        }

        let mut state = SessionState::AwaitTask;
        loop {
            state = match state {
                SessionState::AwaitTask => {
                    let task: Task =
                        match cancellable(&shutdown, read_message(&mut self.stream)).await {
                            Some(result) => result?,
                            None => return Ok(SessionOutcome::Cancelled),
                        };
                    self.gardener_id = Some(task.gardener_id);

                    if task.is_done() {
                        SessionState::Finished
                    } else {
                        SessionState::Processing(task)
                    }
                }

                SessionState::Processing(task) => {
                    self.work_plot(task).await?;

                    match cancellable(&shutdown, write_message(&mut self.stream, &Ack::ok())).await
                    {
                        Some(result) => result?,
                        None => return Ok(SessionOutcome::Cancelled),
                    }
                    SessionState::AwaitTask
                }

                SessionState::Finished => {
                    self.events
                        .action(format!("Gardener {} finished work", self.describe()));

                    match cancellable(&shutdown, write_message(&mut self.stream, &Ack::ok())).await
                    {
                        Some(result) => result?,
                        None => return Ok(SessionOutcome::Cancelled),
                    }

                    info!(
                        "{} finished: {} plots worked, {} claimed, {} owned",
                        self.describe(),
                        self.plots_worked,
                        self.plots_claimed,
                        self.gardener_id
                            .map_or(0, |id| self.garden.field.owned_by(id))
                    );
                    return Ok(SessionOutcome::Finished {
                        plots_worked: self.plots_worked,
                        plots_claimed: self.plots_claimed,
                    });
                }
            };
        }
    }

    /// Validates the task and works its plot.
    ///
    /// The step itself runs on its own task. Aborting the session while it
    /// waits here detaches the step instead of cutting it short, so a zone
    /// is never left mid-step.
    async fn work_plot(&mut self, task: Task) -> Result<(), SessionError> {
        let plot = self.plot_for(&task)?;
        let working_time = u64::try_from(task.working_time_ms)
            .map_err(|_| SessionError::NegativeWorkingTime(task.working_time_ms))?;
        if task.gardener_id <= 0 {
            return Err(SessionError::InvalidGardenerId(task.gardener_id));
        }

        let step = tokio::spawn(plot_step(
            Arc::clone(&self.garden),
            self.events.clone(),
            plot,
            task.gardener_id,
            working_time,
        ));
        let claimed = step.await?;

        self.plots_worked += 1;
        if claimed {
            self.plots_claimed += 1;
        }
        Ok(())
    }

    fn plot_for(&self, task: &Task) -> Result<Plot, SessionError> {
        let field = &self.garden.field;
        field
            .plot_at(task.row, task.col)
            .ok_or(SessionError::PlotOutOfBounds {
                row: task.row,
                col: task.col,
                rows: field.rows(),
                columns: field.columns(),
            })
    }

    fn describe(&self) -> String {
        match self.gardener_id {
            Some(id) => format!("{} ({})", id, self.peer),
            None => self.peer.clone(),
        }
    }
}

/// Claims `plot` if free, then holds its zone for the full working time if
/// claimed or half of it when only helping out. Returns whether it claimed.
async fn plot_step(
    garden: Arc<Garden>,
    events: EventPublisher,
    plot: Plot,
    gardener_id: i32,
    working_time: u64,
) -> bool {
    let guard = garden.zones.lock(garden.zones.zone_of(plot)).await;

    let claimed = garden.field.claim_if_free(&guard, plot, gardener_id);
    let (verb, hold) = if claimed {
        ("takes", working_time)
    } else {
        ("helps with", working_time / 2)
    };
    events.action(format!("Gardener {} {} {} plot", gardener_id, verb, plot));

    tokio::time::sleep(Duration::from_millis(hold)).await;

    events.map(&garden.field);
    guard.release();
    claimed
}

/// Runs `future` unless `token` fires first.
async fn cancellable<F: Future>(token: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = future => Some(output),
    }
}
