//! Worker compute loop
//!
//! A worker is a stateless service unit: it blocks on the next message from
//! the coordinator, computes one dot product per WORK message, replies with a
//! RESULT, and exits on TERMINATE. It never holds more than one unit and keeps
//! nothing between units; the coordinator's protocol guarantees it is never
//! sent a second unit before replying to the first.
//!
//! The same loop runs as an in-process task (standalone mode) and behind a
//! TCP connection (service mode).

use crate::distributed::protocol::{read_message, write_message, Message};
use crate::error::ProtocolError;
use crate::Result;
use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

/// What a worker did before it was terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerSummary {
    /// Work units computed and answered
    pub units_computed: usize,
}

/// Worker bound to one coordinator connection
pub struct Worker<R, W> {
    id: String,
    reader: R,
    writer: W,
}

impl<R, W> Worker<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a worker over a split connection
    ///
    /// `id` only labels log output.
    pub fn new(id: impl Into<String>, reader: R, writer: W) -> Self {
        Self {
            id: id.into(),
            reader,
            writer,
        }
    }

    /// Serve work units until TERMINATE arrives
    ///
    /// A connection that closes before TERMINATE, an undecodable frame, a
    /// malformed unit or a RESULT addressed to the worker are all fatal.
    pub async fn run(mut self) -> Result<WorkerSummary> {
        let mut summary = WorkerSummary::default();

        loop {
            let message = read_message(&mut self.reader)
                .await
                .with_context(|| format!("Worker {} failed to receive", self.id))?
                .with_context(|| format!("Worker {}: coordinator closed the connection before TERMINATE", self.id))?;

            match message {
                Message::Work(unit) => {
                    debug!(worker = %self.id, row = unit.row, col = unit.col, "received work unit");
                    let result = unit.compute()?;
                    write_message(&mut self.writer, &Message::Result(result))
                        .await
                        .with_context(|| format!("Worker {} failed to send result", self.id))?;
                    summary.units_computed += 1;
                }
                Message::Terminate => {
                    info!(worker = %self.id, units = summary.units_computed, "terminated by coordinator");
                    return Ok(summary);
                }
                other @ Message::Result(_) => {
                    return Err(ProtocolError::UnexpectedMessage {
                        role: "worker",
                        kind: other.kind(),
                        from: None,
                    }
                    .into());
                }
            }
        }
    }
}
