//! Distributed multiplication
//!
//! # Architecture
//!
//! One coordinator and a fixed set of workers, talking only through
//! point-to-point messages:
//!
//! - **Coordinator**: owns A, B and C, streams work units to whichever worker
//!   is free, and terminates every worker once the product is complete
//! - **Workers**: stateless loops that answer one unit at a time
//!
//! Workers are either in-process tasks on duplex pipes ([`local`]) or remote
//! [`WorkerService`]s reached over TCP. The coordinator only sees a
//! [`CoordinatorLink`] and cannot tell the two apart.
//!
//! # Modules
//!
//! - `protocol`: message definitions and framing
//! - `link`: coordinator side of the substrate (outboxes + completions channel)
//! - `local`: in-process transport
//! - `schedule`: work queue and scheduling policy
//! - `coordinator`: scheduling loop and termination protocol
//! - `worker_service`: TCP worker service

pub mod coordinator;
pub mod link;
pub mod local;
pub mod protocol;
pub mod schedule;
pub mod worker_service;

// Re-export key types
pub use coordinator::{Coordinator, DispatchStats, Product, WorkerDispatch};
pub use link::{CoordinatorLink, Envelope, WorkerId};
pub use protocol::{Cell, CellResult, Message, MessageKind, WorkUnit, MAX_FRAME_LEN};
pub use schedule::{Schedule, WorkQueue};
pub use worker_service::WorkerService;
