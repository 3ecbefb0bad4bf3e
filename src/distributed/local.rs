//! In-process transport
//!
//! Standalone mode runs every worker as a tokio task connected to the
//! coordinator by a `tokio::io::duplex` pipe. The pipes carry exactly the same
//! frames as a TCP connection, so the coordinator and workers cannot tell the
//! difference.

use crate::distributed::link::CoordinatorLink;
use crate::worker::{Worker, WorkerSummary};
use crate::Result;
use tokio::io::{duplex, split};
use tokio::task::JoinHandle;

/// Pipe capacity per direction
///
/// A work unit for dimension N is roughly 18N bytes, so this comfortably
/// holds one in flight for matrices in the thousands.
const PIPE_CAPACITY: usize = 256 * 1024;

/// Handles to the spawned in-process workers
pub struct LocalWorkers {
    handles: Vec<JoinHandle<Result<WorkerSummary>>>,
}

impl LocalWorkers {
    /// Wait for every worker to exit and collect their summaries
    pub async fn join(self) -> Result<Vec<WorkerSummary>> {
        let mut summaries = Vec::with_capacity(self.handles.len());
        for (i, handle) in self.handles.into_iter().enumerate() {
            let summary = handle
                .await
                .map_err(|e| anyhow::anyhow!("Worker {} task panicked: {}", i, e))??;
            summaries.push(summary);
        }
        Ok(summaries)
    }
}

/// Spawn `workers` in-process workers and the link that reaches them
pub fn spawn(workers: usize) -> (CoordinatorLink, LocalWorkers) {
    let mut streams = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);

    for i in 0..workers {
        let (coordinator_end, worker_end) = duplex(PIPE_CAPACITY);
        streams.push(split(coordinator_end));

        let (reader, writer) = split(worker_end);
        let worker = Worker::new(format!("local-{}", i), reader, writer);
        handles.push(tokio::spawn(worker.run()));
    }

    (CoordinatorLink::from_streams(streams), LocalWorkers { handles })
}
