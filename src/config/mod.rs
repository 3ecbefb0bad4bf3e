//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod toml;
pub mod validator;

use crate::distributed::Schedule;
use crate::matrix::MatrixSource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default matrix dimension
pub const DEFAULT_DIMENSION: usize = 3;

/// Largest accepted matrix dimension
///
/// Keeps N² cells addressable and a work unit (2N elements) well under the
/// frame limit.
pub const MAX_DIMENSION: usize = 1 << 16;

/// Default worker service port
pub const DEFAULT_LISTEN_PORT: u16 = 7878;

/// Default seed for random input
pub const DEFAULT_SEED: u64 = 42;

/// Default range for random input
pub const DEFAULT_MIN_VALUE: i64 = -9;
pub const DEFAULT_MAX_VALUE: i64 = 9;

/// Complete run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub input: MatrixSource,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// What to multiply and with how many workers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Matrix dimension N
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// In-process workers (standalone mode)
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Scheduling policy
    #[serde(default)]
    pub schedule: Schedule,
    /// Worker service addresses (coordinator mode)
    #[serde(default)]
    pub host_list: Vec<String>,
    /// Fail if no result arrives within this many milliseconds
    pub result_timeout_ms: Option<u64>,
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

fn default_workers() -> usize {
    num_cpus::get()
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            workers: default_workers(),
            schedule: Schedule::default(),
            host_list: Vec::new(),
            result_timeout_ms: None,
        }
    }
}

impl JobConfig {
    pub fn result_timeout(&self) -> Option<Duration> {
        self.result_timeout_ms.map(Duration::from_millis)
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON report path
    pub json_output: Option<PathBuf>,
    /// Write C as a text matrix file
    pub matrix_output: Option<PathBuf>,
    /// Skip printing matrices
    #[serde(default)]
    pub quiet: bool,
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Port the worker service listens on
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Dry run mode
    #[serde(default)]
    pub dry_run: bool,
    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            dry_run: false,
            debug: false,
        }
    }
}
