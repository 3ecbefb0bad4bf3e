//! matmesh CLI entry point

use anyhow::{Context, Result};
use matmesh::config::cli::{Cli, ExecutionMode};
use matmesh::config::{toml, validator, Config};
use matmesh::distributed::{local, Coordinator, CoordinatorLink, Product, WorkerService};
use matmesh::matrix::{source, Matrix, MatrixSource};
use matmesh::output::{json, text};
use std::time::{Duration, Instant};
use tracing::Level;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();
    cli.validate()?;

    let config = build_config_from_cli(&cli)?;
    init_logging(config.runtime.debug);

    if !config.output.quiet {
        println!("matmesh v{}", env!("CARGO_PKG_VERSION"));
        println!();
    }

    // Handle different execution modes
    match cli.mode {
        ExecutionMode::Standalone => run_standalone(config),
        ExecutionMode::Coordinator => run_coordinator(config),
        ExecutionMode::Service => run_service(config),
    }
}

/// Logs go to stderr so stdout only carries results
fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Build configuration from the optional TOML file and CLI arguments
fn build_config_from_cli(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => toml::parse_toml_file(path)?,
        None => Config::default(),
    };

    toml::merge_cli_with_config(cli, base)
}

/// Run in standalone mode (coordinator plus in-process workers)
fn run_standalone(config: Config) -> Result<()> {
    validator::validate_config(&config).context("Configuration validation failed")?;

    print_configuration(&config, "standalone");
    if config.runtime.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let (a, b) = load_inputs(&config)?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let start = Instant::now();
    let product = runtime.block_on(async {
        let (link, workers) = local::spawn(config.job.workers);
        let product = build_coordinator(&config, a.clone(), b.clone())?.run(link).await?;
        workers.join().await.context("In-process worker failed")?;
        Ok::<_, anyhow::Error>(product)
    })?;

    report(&config, &a, &b, &product, start.elapsed())
}

/// Run in coordinator mode (remote worker services over TCP)
fn run_coordinator(mut config: Config) -> Result<()> {
    config.job.workers = config.job.host_list.len();
    validator::validate_coordinator(&config).context("Configuration validation failed")?;

    print_configuration(&config, "coordinator");
    if config.runtime.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let (a, b) = load_inputs(&config)?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let start = Instant::now();
    let product = runtime.block_on(async {
        let link = CoordinatorLink::connect(&config.job.host_list).await?;
        build_coordinator(&config, a.clone(), b.clone())?.run(link).await
    })?;

    report(&config, &a, &b, &product, start.elapsed())
}

/// Run in service mode (worker host)
fn run_service(config: Config) -> Result<()> {
    if config.runtime.dry_run {
        println!("Dry run mode - worker service would listen on port {}", config.runtime.listen_port);
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    runtime.block_on(async { WorkerService::new(config.runtime.listen_port).run().await })
}

fn load_inputs(config: &Config) -> Result<(Matrix, Matrix)> {
    config
        .input
        .load(config.job.dimension)
        .context("Failed to load input matrices")
}

fn build_coordinator(config: &Config, a: Matrix, b: Matrix) -> Result<Coordinator> {
    Ok(Coordinator::new(a, b)?
        .with_schedule(config.job.schedule)
        .with_result_timeout(config.job.result_timeout()))
}

fn report(config: &Config, a: &Matrix, b: &Matrix, product: &Product, elapsed: Duration) -> Result<()> {
    if !config.output.quiet {
        println!();
        text::print_matrices(a, b, &product.matrix);
        text::print_summary(product, elapsed);
    }

    if let Some(ref path) = config.output.json_output {
        let report = json::JsonReport::new(product, config.job.schedule, elapsed);
        json::write_json_output(path, &report, true)?;
        if !config.output.quiet {
            println!("JSON report written to {}", path.display());
        }
    }

    if let Some(ref path) = config.output.matrix_output {
        source::save_to_file(&product.matrix, path)?;
        if !config.output.quiet {
            println!("Matrix C written to {}", path.display());
        }
    }

    Ok(())
}

fn print_configuration(config: &Config, mode: &str) {
    if config.output.quiet {
        return;
    }

    println!("Configuration:");
    println!("  Mode: {}", mode);
    println!("  Dimension: {}", config.job.dimension);
    println!("  Workers: {}", config.job.workers);
    println!("  Schedule: {}", config.job.schedule);
    match config.input {
        MatrixSource::Example => println!("  Input: example"),
        MatrixSource::Random { seed, min, max } => {
            println!("  Input: random (seed {}, values {}..={})", seed, min, max)
        }
        MatrixSource::Files { ref a, ref b } => {
            println!("  Input: files ({}, {})", a.display(), b.display())
        }
        MatrixSource::Stdin => println!("  Input: stdin ({} integers)", 2 * config.job.dimension.pow(2)),
    }
    if let Some(timeout) = config.job.result_timeout() {
        println!("  Result timeout: {}ms", timeout.as_millis());
    }
    for host in &config.job.host_list {
        println!("  Worker: {}", host);
    }
}
