//! Coordinator side of the messaging substrate
//!
//! A [`CoordinatorLink`] turns N independent worker connections into:
//!
//! - one outbox per worker (`send(worker, message)`), drained by a writer task
//! - one shared completions channel fed by every reader task (`recv_any()`)
//!
//! The shared channel is the any-source receive: the coordinator processes
//! whichever worker answers first, which is what balances load across
//! workers of uneven speed. Connections may be TCP streams or in-process
//! duplex pipes; both carry the same framed messages.
//!
//! A connection that fails (an undecodable frame or a transport error) is
//! delivered on the same channel as an error, so the coordinator stops at
//! the next receive instead of waiting on the remaining workers.

use crate::distributed::protocol::{read_message, write_message, Message};
use crate::error::ProtocolError;
use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Worker index on a link (0-based)
pub type WorkerId = usize;

/// A message together with the worker that sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub source: WorkerId,
    pub message: Message,
}

/// Coordinator view of all worker connections
pub struct CoordinatorLink {
    outboxes: Vec<Option<mpsc::UnboundedSender<Message>>>,
    completions: mpsc::UnboundedReceiver<Result<Envelope>>,
    tasks: JoinSet<Result<()>>,
}

impl CoordinatorLink {
    /// Build a link from already-split worker streams
    ///
    /// Worker `i` is the `i`-th pair. Spawns one reader and one writer task
    /// per worker; must be called inside a tokio runtime.
    pub fn from_streams<R, W>(streams: Vec<(R, W)>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let mut outboxes = Vec::with_capacity(streams.len());
        let mut tasks = JoinSet::new();

        for (worker, (reader, writer)) in streams.into_iter().enumerate() {
            let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
            outboxes.push(Some(outbox_tx));

            tasks.spawn(writer_loop(worker, writer, outbox_rx));
            tasks.spawn(reader_loop(worker, reader, completions_tx.clone()));
        }

        // Only reader tasks hold senders now, so the channel closes once
        // every worker connection has ended.
        drop(completions_tx);

        Self {
            outboxes,
            completions,
            tasks,
        }
    }

    /// Connect to remote worker services over TCP
    pub async fn connect(addresses: &[String]) -> Result<Self> {
        let mut streams = Vec::with_capacity(addresses.len());

        for (i, addr) in addresses.iter().enumerate() {
            debug!(worker = i, %addr, "connecting to worker");
            let stream = TcpStream::connect(addr)
                .await
                .with_context(|| format!("Failed to connect to worker {} ({})", i, addr))?;
            stream
                .set_nodelay(true)
                .with_context(|| format!("Failed to configure connection to {}", addr))?;
            streams.push(stream.into_split());
        }

        Ok(Self::from_streams(streams))
    }

    /// Number of workers on this link
    pub fn worker_count(&self) -> usize {
        self.outboxes.len()
    }

    /// Hand a message to the transport for `worker`
    pub fn send(&self, worker: WorkerId, message: Message) -> Result<()> {
        let outbox = self
            .outboxes
            .get(worker)
            .ok_or(ProtocolError::WorkerOutOfRange {
                worker,
                workers: self.outboxes.len(),
            })?
            .as_ref()
            .with_context(|| format!("Outbox for worker {} is closed", worker))?;

        outbox
            .send(message)
            .map_err(|_| anyhow::anyhow!("Connection to worker {} is closed", worker))
    }

    /// Close the outbox of one worker once it has been sent its last message
    pub fn close_outbox(&mut self, worker: WorkerId) {
        if let Some(slot) = self.outboxes.get_mut(worker) {
            slot.take();
        }
    }

    /// Wait for the next message from any worker
    ///
    /// Yields an error as soon as any connection fails, and `None` once
    /// every worker connection has closed.
    pub async fn recv_any(&mut self) -> Option<Result<Envelope>> {
        self.completions.recv().await
    }

    /// Flush all outboxes and wait for every connection task to finish
    pub async fn close(mut self) -> Result<()> {
        self.outboxes.clear();

        let mut first_error = None;
        while let Some(joined) = self.tasks.join_next().await {
            let outcome = joined
                .context("Connection task panicked")
                .and_then(|result| result);
            if let Err(e) = outcome {
                warn!("connection task failed: {:#}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn writer_loop<W>(worker: WorkerId, mut writer: W, mut outbox: mpsc::UnboundedReceiver<Message>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbox.recv().await {
        write_message(&mut writer, &message)
            .await
            .with_context(|| format!("Failed to send {} message to worker {}", message.kind(), worker))?;
    }

    // Shutdown errors only mean the worker already hung up
    let _ = writer.shutdown().await;
    Ok(())
}

async fn reader_loop<R>(worker: WorkerId, mut reader: R, completions: mpsc::UnboundedSender<Result<Envelope>>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_message(&mut reader).await {
            Ok(Some(message)) => {
                let envelope = Envelope {
                    source: worker,
                    message,
                };
                if completions.send(Ok(envelope)).is_err() {
                    // Coordinator stopped listening
                    return Ok(());
                }
            }
            Ok(None) => {
                debug!(worker, "worker connection closed");
                return Ok(());
            }
            Err(e) => {
                warn!(worker, "failed to read from worker: {:#}", e);
                let _ = completions.send(Err(e.context(format!("Connection to worker {} failed", worker))));
                return Ok(());
            }
        }
    }
}
