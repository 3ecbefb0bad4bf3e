//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Standalone mode (default) - coordinator and in-process workers
    Standalone,
    /// Coordinator mode - drive remote worker services over TCP
    Coordinator,
    /// Service mode - run a worker service on this host
    Service,
}

/// matmesh - demand-driven distributed matrix multiplication
#[derive(Parser, Debug)]
#[command(name = "matmesh")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: standalone, coordinator, or service
    #[arg(long, value_enum, default_value = "standalone")]
    pub mode: ExecutionMode,

    /// Port for the worker service to listen on (service mode only) [default: 7878]
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Comma-separated worker service addresses for coordinator mode (e.g., "10.0.1.10:7878,10.0.1.11:7878")
    #[arg(long)]
    pub host_list: Option<String>,

    // === Job Options ===
    /// Matrix dimension N [default: 3]
    #[arg(short = 'n', long)]
    pub dimension: Option<usize>,

    /// Number of in-process workers (standalone mode) [default: number of CPUs]
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Scheduling policy [default: dynamic]
    #[arg(long, value_enum)]
    pub schedule: Option<ScheduleType>,

    /// Fail if no result arrives in time (e.g., 500ms, 30s; plain numbers are milliseconds)
    #[arg(long)]
    pub result_timeout: Option<String>,

    // === Input Options ===
    /// Where matrices A and B come from [default: example]
    #[arg(long, value_enum)]
    pub input: Option<InputType>,

    /// Seed for random input [default: 42]
    #[arg(long)]
    pub seed: Option<u64>,

    /// Smallest random value [default: -9]
    #[arg(long, allow_negative_numbers = true)]
    pub min_value: Option<i64>,

    /// Largest random value [default: 9]
    #[arg(long, allow_negative_numbers = true)]
    pub max_value: Option<i64>,

    /// Text file holding matrix A (files input)
    #[arg(long)]
    pub matrix_a: Option<PathBuf>,

    /// Text file holding matrix B (files input)
    #[arg(long)]
    pub matrix_b: Option<PathBuf>,

    // === Output Options ===
    /// JSON report path
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Write the product matrix C to a text file
    #[arg(long)]
    pub output_matrix: Option<PathBuf>,

    /// Do not print matrices
    #[arg(long)]
    pub quiet: bool,

    // === Configuration File ===
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Dry run - validate configuration without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Scheduling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScheduleType {
    /// Any free worker takes the next cell
    Dynamic,
    /// Rows are owned round-robin by workers
    Static,
}

/// Matrix input source
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputType {
    /// Fixed example model
    Example,
    /// Seeded random values
    Random,
    /// Text files given by --matrix-a and --matrix-b
    Files,
    /// 2N² integers read from stdin
    Stdin,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        // Service mode takes everything from the coordinator
        if self.mode == ExecutionMode::Service {
            return Ok(());
        }

        if self.mode == ExecutionMode::Coordinator && self.workers.is_some() {
            anyhow::bail!("--workers only applies to standalone mode; use --host-list in coordinator mode");
        }

        if self.matrix_a.is_some() != self.matrix_b.is_some() {
            anyhow::bail!("--matrix-a and --matrix-b must be given together");
        }

        if let Some(input) = self.input {
            if input != InputType::Files && self.matrix_a.is_some() {
                anyhow::bail!("--matrix-a/--matrix-b require --input files");
            }
        }

        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                anyhow::bail!("--min-value ({}) must not exceed --max-value ({})", min, max);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("matmesh").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.mode, ExecutionMode::Standalone);
        assert!(cli.dimension.is_none());
        assert!(cli.workers.is_none());
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_job_flags() {
        let cli = parse(&["-n", "8", "-w", "4", "--schedule", "static", "--result-timeout", "2s"]);
        assert_eq!(cli.dimension, Some(8));
        assert_eq!(cli.workers, Some(4));
        assert_eq!(cli.schedule, Some(ScheduleType::Static));
        assert_eq!(cli.result_timeout.as_deref(), Some("2s"));
    }

    #[test]
    fn test_negative_random_range() {
        let cli = parse(&["--input", "random", "--min-value", "-100", "--max-value", "-1"]);
        assert_eq!(cli.min_value, Some(-100));
        assert!(cli.validate().is_ok());

        let cli = parse(&["--min-value", "5", "--max-value", "1"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_matrix_files_must_be_paired() {
        let cli = parse(&["--input", "files", "--matrix-a", "a.txt"]);
        assert!(cli.validate().is_err());

        let cli = parse(&["--input", "random", "--matrix-a", "a.txt", "--matrix-b", "b.txt"]);
        assert!(cli.validate().is_err());

        let cli = parse(&["--input", "files", "--matrix-a", "a.txt", "--matrix-b", "b.txt"]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_workers_rejected_in_coordinator_mode() {
        let cli = parse(&["--mode", "coordinator", "--host-list", "a:1", "-w", "2"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_service_mode_skips_validation() {
        let cli = parse(&["--mode", "service", "--listen-port", "9000", "--min-value", "5", "--max-value", "1"]);
        assert_eq!(cli.listen_port, Some(9000));
        assert!(cli.validate().is_ok());
    }
}
