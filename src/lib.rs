//! matmesh - demand-driven distributed matrix multiplication
//!
//! One coordinator owns the input matrices and streams single-cell work units
//! to a fixed set of stateless workers, handing the next unit to whichever
//! worker answers first. Coordinator and workers share nothing; every
//! interaction is a point-to-point message.
//!
//! # Architecture
//!
//! - **Matrices**: heap-owned, bounds-checked square matrices and input sources
//! - **Protocol**: WORK / RESULT / TERMINATE frames over any async byte stream
//! - **Coordinator**: demand-driven scheduling loop with per-worker backpressure
//! - **Workers**: in-process tasks (standalone) or TCP services (distributed)

pub mod config;
pub mod distributed;
pub mod error;
pub mod matrix;
pub mod output;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use distributed::{Coordinator, CoordinatorLink, Product, Schedule};
pub use error::ProtocolError;
pub use matrix::Matrix;
pub use worker::Worker;

/// Result type used throughout matmesh
pub type Result<T> = anyhow::Result<T>;
