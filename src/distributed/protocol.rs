//! Coordinator/worker wire protocol
//!
//! Three message kinds travel between the coordinator and its workers. The
//! protocol uses MessagePack (rmp-serde) for compact binary serialization; the
//! enum discriminant is the message tag, decoded once at the receive boundary.
//!
//! # Message Flow
//!
//! ```text
//! Coordinator                          Worker
//!     |                                   |
//!     |--- WORK(row, col, a_row, b_col) ->|
//!     |                                   |  value = a_row · b_col
//!     |<------ RESULT(row, col, value) ---|
//!     |                                   |
//!     |--- WORK(...) -------------------->|   (same worker, next cell)
//!     |<------ RESULT(...) ---------------|
//!     |                                   |
//!     |--- TERMINATE -------------------->|   (exactly once, always last)
//! ```
//!
//! A worker never holds more than one WORK message: the coordinator only
//! sends the next one after the previous RESULT has been received.
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use crate::error::ProtocolError;
use crate::matrix::{dot, Element};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame body
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Output cell coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// One output cell to compute, with the data needed to compute it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub row: usize,
    pub col: usize,
    /// Row `row` of A
    pub row_vector: Vec<Element>,
    /// Column `col` of B
    pub col_vector: Vec<Element>,
}

impl WorkUnit {
    pub fn cell(&self) -> Cell {
        Cell::new(self.row, self.col)
    }

    /// Compute the dot product for this unit
    pub fn compute(&self) -> std::result::Result<CellResult, ProtocolError> {
        if self.row_vector.len() != self.col_vector.len() {
            return Err(ProtocolError::MalformedWorkUnit {
                row: self.row,
                col: self.col,
                row_len: self.row_vector.len(),
                col_len: self.col_vector.len(),
            });
        }

        Ok(CellResult {
            row: self.row,
            col: self.col,
            value: dot(&self.row_vector, &self.col_vector),
        })
    }
}

/// Computed value for a previously dispatched work unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellResult {
    pub row: usize,
    pub col: usize,
    pub value: Element,
}

impl CellResult {
    pub fn cell(&self) -> Cell {
        Cell::new(self.row, self.col)
    }
}

/// Protocol message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Work message (Coordinator → Worker)
    Work(WorkUnit),

    /// Result message (Worker → Coordinator)
    Result(CellResult),

    /// Terminate message (Coordinator → Worker)
    ///
    /// Sent exactly once per worker, after its last result.
    Terminate,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Work(_) => MessageKind::Work,
            Self::Result(_) => MessageKind::Result,
            Self::Terminate => MessageKind::Terminate,
        }
    }
}

/// Payload-free message tag, used in logs and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Work,
    Result,
    Terminate,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Work => "work",
            Self::Result => "result",
            Self::Terminate => "terminate",
        };
        f.write_str(name)
    }
}

/// Serialize a message to bytes
///
/// Prepends a 4-byte length field for framing.
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>> {
    let msg_bytes = rmp_serde::to_vec(msg).context("Failed to serialize message")?;

    if msg_bytes.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: msg_bytes.len(),
            max: MAX_FRAME_LEN,
        }
        .into());
    }

    let msg_len = msg_bytes.len() as u32;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Decode a frame body into a message
///
/// A body that names no message kind, or carries the wrong payload shape,
/// is a protocol violation rather than a transport failure.
fn decode_message(body: &[u8]) -> std::result::Result<Message, ProtocolError> {
    rmp_serde::from_slice(body).map_err(|e| ProtocolError::UndecodableFrame {
        len: body.len(),
        reason: e.to_string(),
    })
}

/// Read one message from a stream
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary.
pub async fn read_message<R>(stream: &mut R) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e).context("Failed to read message length"),
    }

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    if msg_len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: msg_len,
            max: MAX_FRAME_LEN,
        }
        .into());
    }

    let mut msg_buf = vec![0u8; msg_len];
    stream
        .read_exact(&mut msg_buf)
        .await
        .context("Failed to read message body")?;

    Ok(Some(decode_message(&msg_buf)?))
}

/// Write a message to a stream and flush it
pub async fn write_message<W>(stream: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let framed = serialize_message(msg)?;

    stream.write_all(&framed).await.context("Failed to write message")?;
    stream.flush().await.context("Failed to flush stream")?;

    Ok(())
}
