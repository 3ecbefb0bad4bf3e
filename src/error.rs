//! Protocol error taxonomy
//!
//! Every variant is a fatal internal-consistency failure: the coordinator and
//! workers never retry and never report partial products. Configuration
//! errors are not listed here; they are rejected by
//! [`crate::config::validator`] before any message is sent.

use crate::distributed::protocol::MessageKind;
use thiserror::Error;

/// Fatal violation of the coordinator/worker protocol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A result arrived for a cell that was already written to C
    #[error("duplicate result for cell ({row}, {col}) from worker {worker}")]
    DuplicateResult { worker: usize, row: usize, col: usize },

    /// A worker answered for a cell it was not holding
    #[error("worker {worker} returned cell ({row}, {col}) but was assigned {assigned}")]
    UnassignedResult {
        worker: usize,
        row: usize,
        col: usize,
        assigned: String,
    },

    /// A message kind that is never valid in this direction
    #[error("{role} received unexpected {kind} message{}", sender_suffix(.from))]
    UnexpectedMessage {
        role: &'static str,
        kind: MessageKind,
        from: Option<usize>,
    },

    /// Row and column vectors of a work unit disagree in length
    #[error("work unit ({row}, {col}) has row length {row_len} but column length {col_len}")]
    MalformedWorkUnit {
        row: usize,
        col: usize,
        row_len: usize,
        col_len: usize,
    },

    /// Frame length prefix exceeds the protocol limit
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// Frame body is not a valid message (unknown tag or wrong shape)
    #[error("undecodable frame of {len} bytes: {reason}")]
    UndecodableFrame { len: usize, reason: String },

    /// Send or receive addressed a worker the link does not have
    #[error("worker {worker} out of range (link has {workers} workers)")]
    WorkerOutOfRange { worker: usize, workers: usize },

    /// Every worker connection closed while results were still pending
    #[error("all workers disconnected with {pending} results pending")]
    WorkersDisconnected { pending: usize },

    /// No result arrived within the configured receive timeout
    #[error("no result received within {timeout_ms}ms ({pending} results pending)")]
    ResultTimeout { timeout_ms: u64, pending: usize },
}

fn sender_suffix(from: &Option<usize>) -> String {
    match from {
        Some(worker) => format!(" from worker {}", worker),
        None => String::new(),
    }
}
