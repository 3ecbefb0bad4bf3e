//! Configuration validation
//!
//! Everything here runs before any message is sent, so a bad configuration
//! never leaves workers half-started.

use super::*;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_job(&config.job)?;
    validate_input(&config.input)?;
    validate_output(&config.output)?;

    Ok(())
}

/// Validate configuration for coordinator mode
///
/// The worker count is the number of addresses in the host list.
pub fn validate_coordinator(config: &Config) -> Result<()> {
    if config.job.host_list.is_empty() {
        anyhow::bail!("Coordinator mode requires --host-list with at least one worker address");
    }
    for host in &config.job.host_list {
        validate_address(host)?;
    }

    validate_config(config)
}

/// Validate job configuration
pub fn validate_job(job: &JobConfig) -> Result<()> {
    if job.dimension == 0 {
        anyhow::bail!("dimension must be at least 1");
    }

    if job.dimension > MAX_DIMENSION {
        anyhow::bail!("dimension must be at most {} (got {})", MAX_DIMENSION, job.dimension);
    }

    if job.workers == 0 {
        anyhow::bail!("workers must be at least 1");
    }

    if job.result_timeout_ms == Some(0) {
        anyhow::bail!("result_timeout must be greater than zero");
    }

    Ok(())
}

/// Validate the input source
pub fn validate_input(input: &MatrixSource) -> Result<()> {
    match input {
        MatrixSource::Random { min, max, .. } => {
            if min > max {
                anyhow::bail!("Random value range is empty: min ({}) > max ({})", min, max);
            }
        }
        MatrixSource::Files { a, b } => {
            for (name, path) in [("A", a), ("B", b)] {
                if path.as_os_str().is_empty() {
                    anyhow::bail!("Files input requires a path for matrix {}", name);
                }
                if !path.is_file() {
                    anyhow::bail!("Matrix {} file not found: {}", name, path.display());
                }
            }
        }
        MatrixSource::Example | MatrixSource::Stdin => {}
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if let Some(ref path) = output.json_output {
        if path.is_dir() {
            anyhow::bail!("JSON output path is a directory: {}", path.display());
        }
    }

    if let Some(ref path) = output.matrix_output {
        if path.is_dir() {
            anyhow::bail!("Matrix output path is a directory: {}", path.display());
        }
    }

    Ok(())
}

fn validate_address(host: &str) -> Result<()> {
    match host.rsplit_once(':') {
        Some((name, port)) if !name.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => anyhow::bail!("Invalid worker address '{}': expected host:port", host),
    }
}
