//! Docsweep main entry point
//!
//! This is the command-line interface for the docsweep document harvester.

use anyhow::Context;
use clap::Parser;
use docsweep::config::{load_config_with_hash, Config};
use docsweep::crawler::Coordinator;
use docsweep::output::print_summary;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Docsweep: a paginated document harvester
///
/// Docsweep walks a paginated listing, downloads every linked document once
/// under a deterministic name, and appends what it stored to a CSV table.
#[derive(Parser, Debug)]
#[command(name = "docsweep")]
#[command(version)]
#[command(about = "A paginated document harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            let _ = setup_logging(&cli, None, None);
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).with_context(|| format!("invalid config {}", cli.config.display()));
        }
    };

    if cli.dry_run {
        let _ = setup_logging(&cli, config.log_level.as_deref(), None);
        handle_dry_run(&config, &config_hash);
        return Ok(());
    }

    let logs_dir = config.logs_dir();
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("cannot create log directory {}", logs_dir.display()))?;
    let _guard = setup_logging(&cli, config.log_level.as_deref(), Some(&logs_dir));

    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    handle_run(config).await
}

/// Sets up console logging and, when a directory is given, a per-run log file
///
/// Verbosity flags win over the config's `log-level`. The returned guard
/// must stay alive until exit so the file writer is flushed.
fn setup_logging(
    cli: &Cli,
    config_level: Option<&str>,
    logs_dir: Option<&Path>,
) -> Option<WorkerGuard> {
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else {
        match cli.verbose {
            0 => match config_level {
                Some(level) => {
                    let level = match level.to_ascii_lowercase().as_str() {
                        "warning" => "warn".to_string(),
                        other => other.to_string(),
                    };
                    EnvFilter::new(format!("docsweep={},warn", level))
                }
                None => EnvFilter::new("docsweep=info,warn"),
            },
            1 => EnvFilter::new("docsweep=debug,info"),
            2 => EnvFilter::new("docsweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let (file_layer, guard) = match logs_dir {
        Some(dir) => {
            let file_name = format!("{}.log", chrono::Local::now().format("%Y%m%d_%H%M%S"));
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    guard
}

/// Handles the --dry-run mode: shows what would be harvested
fn handle_dry_run(config: &Config, config_hash: &str) {
    println!("=== Docsweep Dry Run ===\n");

    println!("Start URLs ({}):", config.start_urls.len());
    for url in &config.start_urls {
        println!("  - {}", url);
    }

    println!("\nOutput:");
    println!("  Root: {}", config.output_root().display());
    println!("  Files: {}", config.files_dir().display());
    println!("  Metadata: {}", config.metadata_path().display());
    println!("  Logs: {}", config.logs_dir().display());

    let crawler = &config.crawler;
    println!("\nCrawler Configuration:");
    println!("  Document extension: .{}", crawler.file_extension.trim_start_matches('.'));
    match crawler.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: unbounded"),
    }
    println!("  Max concurrent requests: {}", crawler.max_concurrent_requests);
    println!("  Max requests per host: {}", crawler.max_requests_per_host);
    println!("  Download delay: {}ms", crawler.download_delay_ms);
    println!("  Request timeout: {}s", crawler.request_timeout_secs);
    println!(
        "  Retries: {} (backoff {}ms)",
        crawler.max_retries, crawler.retry_backoff_ms
    );
    println!("  Obey robots.txt: {}", crawler.obey_robots);
    if crawler.allowed_domains.is_empty() {
        println!("  Allowed domains: any");
    } else {
        println!("  Allowed domains: {}", crawler.allowed_domains.join(", "));
    }
    if let Some(days) = crawler.artifact_expiry_days {
        println!("  Artifact expiry: {} days", days);
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\n✓ Configuration is valid (hash: {})", config_hash);
}

/// Handles the main harvest run
async fn handle_run(config: Config) -> anyhow::Result<()> {
    tracing::info!("Start URLs: {}", config.start_urls.len());

    let coordinator = Coordinator::new(config).context("failed to prepare run")?;

    let cancel = coordinator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            cancel.cancel();
        }
    });

    match coordinator.run().await {
        Ok(summary) => {
            tracing::info!("Run completed");
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            Err(e).context("run aborted")
        }
    }
}
