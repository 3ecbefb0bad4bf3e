//! TOML configuration file parsing

use super::*;
use crate::config::cli::{Cli, InputType, ScheduleType};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Override job settings
    if let Some(dimension) = cli.dimension {
        config.job.dimension = dimension;
    }
    if let Some(workers) = cli.workers {
        config.job.workers = workers;
    }
    if let Some(schedule) = cli.schedule {
        config.job.schedule = match schedule {
            ScheduleType::Dynamic => Schedule::Dynamic,
            ScheduleType::Static => Schedule::Static,
        };
    }
    if let Some(ref hosts) = cli.host_list {
        config.job.host_list = parse_host_list(hosts, DEFAULT_LISTEN_PORT);
    }
    if let Some(ref timeout) = cli.result_timeout {
        config.job.result_timeout_ms = Some(parse_duration_ms(timeout)?);
    }

    // Override input source
    config.input = merge_input(cli, config.input);

    // Override output settings
    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if let Some(ref path) = cli.output_matrix {
        config.output.matrix_output = Some(path.clone());
    }
    if cli.quiet {
        config.output.quiet = true;
    }

    // Override runtime settings
    if let Some(port) = cli.listen_port {
        config.runtime.listen_port = port;
    }
    if cli.dry_run {
        config.runtime.dry_run = true;
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    Ok(config)
}

/// Resolve the input source from CLI flags on top of the configured one
fn merge_input(cli: &Cli, current: MatrixSource) -> MatrixSource {
    let input = match cli.input {
        Some(input) => input,
        None if cli.matrix_a.is_some() && cli.matrix_b.is_some() => InputType::Files,
        None if cli.seed.is_some() || cli.min_value.is_some() || cli.max_value.is_some() => InputType::Random,
        None => return current,
    };

    match input {
        InputType::Example => MatrixSource::Example,
        InputType::Stdin => MatrixSource::Stdin,
        InputType::Random => {
            let (seed, min, max) = match current {
                MatrixSource::Random { seed, min, max } => (seed, min, max),
                _ => (DEFAULT_SEED, DEFAULT_MIN_VALUE, DEFAULT_MAX_VALUE),
            };
            MatrixSource::Random {
                seed: cli.seed.unwrap_or(seed),
                min: cli.min_value.unwrap_or(min),
                max: cli.max_value.unwrap_or(max),
            }
        }
        InputType::Files => match (&cli.matrix_a, &cli.matrix_b, current) {
            (Some(a), Some(b), _) => MatrixSource::Files {
                a: a.clone(),
                b: b.clone(),
            },
            (_, _, files @ MatrixSource::Files { .. }) => files,
            // Left empty so validation reports the missing paths
            _ => MatrixSource::Files {
                a: PathBuf::new(),
                b: PathBuf::new(),
            },
        },
    }
}

/// Split a comma-separated address list, dropping empty entries
///
/// Addresses without a port get `default_port`.
pub fn parse_host_list(s: &str, default_port: u16) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(|host| {
            if host.contains(':') {
                host.to_string()
            } else {
                format!("{}:{}", host, default_port)
            }
        })
        .collect()
}

/// Parse a duration string (e.g., "500ms", "30s", "2m") to milliseconds
///
/// Plain numbers are milliseconds.
pub fn parse_duration_ms(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if let Some(num) = s.strip_suffix("ms") {
        (num, 1u64)
    } else if let Some(num) = s.strip_suffix('s') {
        (num, 1000)
    } else if let Some(num) = s.strip_suffix('m') {
        (num, 60_000)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Duration too large: {}", s))
}
