//! Seller-Scout main entry point
//!
//! This is the command-line interface for the Seller-Scout crawler.

use anyhow::Context;
use clap::Parser;
use seller_scout::config::{parse_config_with_hash, validate, Config};
use seller_scout::crawler::{build_http_client, build_solver, crawl, RunOutcome};
use seller_scout::output::{load_output_statistics, print_output_statistics, print_run_summary};
use seller_scout::storage::{JsonProgressLedger, ProgressLedger, SessionStore};
use seller_scout::MarketId;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Exit status reported when a run stops on an interrupt
const EXIT_INTERRUPTED: u8 = 130;

/// Seller-Scout: a resumable seller-registration crawler
///
/// Walks storefront market identifiers in ascending order, records the
/// seller-registration fields of each market page to CSV, and checkpoints
/// after every identifier so an interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "seller-scout")]
#[command(version = "1.0.0")]
#[command(about = "A resumable seller-registration crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// First market identifier (default: resume after the last checkpoint)
    #[arg(long, value_name = "N")]
    start: Option<MarketId>,

    /// Last market identifier, inclusive
    #[arg(long, value_name = "N")]
    end: Option<MarketId>,

    /// Path of the CSV result file
    #[arg(long, value_name = "PATH")]
    out: Option<String>,

    /// Minimum pause between markets, in seconds
    #[arg(long, value_name = "SECS")]
    delay_min: Option<f64>,

    /// Maximum pause between markets, in seconds
    #[arg(long, value_name = "SECS")]
    delay_max: Option<f64>,

    /// Log a summary line every N markets
    #[arg(long, value_name = "N")]
    summary_every: Option<u64>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "solve_session"])]
    dry_run: bool,

    /// Show statistics from the result file and progress ledger and exit
    #[arg(long, conflicts_with_all = ["dry_run", "solve_session"])]
    stats: bool,

    /// Solve the challenge once, save the session and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    solve_session: bool,
}

impl Cli {
    /// Applies command-line values on top of the file configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(start) = self.start {
            config.crawler.start_id = Some(start);
        }
        if let Some(end) = self.end {
            config.crawler.end_id = Some(end);
        }
        if let Some(out) = &self.out {
            config.output.csv_path = out.clone();
        }
        if let Some(delay_min) = self.delay_min {
            config.crawler.delay_min = delay_min;
        }
        if let Some(delay_max) = self.delay_max {
            config.crawler.delay_max = delay_max;
        }
        if let Some(summary_every) = self.summary_every {
            config.crawler.summary_every = summary_every;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("[error] {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = parse_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };
    cli.apply_overrides(&mut config);

    if cli.stats {
        handle_stats(&config)?;
        return Ok(ExitCode::SUCCESS);
    }
    if cli.solve_session {
        handle_solve_session(&config).await?;
        return Ok(ExitCode::SUCCESS);
    }

    validate(&config).context("Invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(ExitCode::SUCCESS);
    }

    handle_crawl(&config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("seller_scout=info,warn"),
            1 => EnvFilter::new("seller_scout=debug,info"),
            2 => EnvFilter::new("seller_scout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the resolved range and paths
fn handle_dry_run(config: &Config) {
    let ledger = JsonProgressLedger::new(&config.output.progress_path);
    let checkpoint = ledger.load();

    println!("=== Seller-Scout Dry Run ===\n");

    println!("Range:");
    match (config.crawler.start_id, checkpoint) {
        (Some(start), _) => println!("  Start: {} (from config/command line)", start),
        (None, Some(record)) => println!(
            "  Start: {} (resuming after checkpoint {})",
            record.last_id.saturating_add(1),
            record.last_id
        ),
        (None, None) => println!("  Start: 1 (no checkpoint)"),
    }
    if let Some(end) = config.crawler.end_id {
        println!("  End: {}", end);
    }

    println!("\nPacing:");
    println!(
        "  Delay: {:.2}s - {:.2}s",
        config.crawler.delay_min, config.crawler.delay_max
    );
    println!("  Fetch timeout: {}ms", config.crawler.fetch_timeout_ms);
    println!("  Summary every: {} markets", config.crawler.summary_every);

    println!("\nTarget:");
    println!("  Market URL: {}", config.target.market_url(1));
    println!("  Bootstrap URL: {}", config.target.bootstrap_url());
    println!("  User agent: {}", config.target.user_agent);

    println!("\nSession:");
    println!("  Path: {}", config.session.path);
    match &config.session.solve_command {
        Some(command) => println!("  Solver: {}", command.join(" ")),
        None => println!("  Solver: built-in HTTP bootstrap"),
    }

    println!("\nOutput:");
    println!("  CSV: {}", config.output.csv_path);
    println!("  Progress: {}", config.output.progress_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: summarises the result file
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Result file: {}\n", config.output.csv_path);

    let ledger = JsonProgressLedger::new(&config.output.progress_path);
    let stats = load_output_statistics(Path::new(&config.output.csv_path), &ledger)?;
    print_output_statistics(&stats);

    Ok(())
}

/// Handles the --solve-session mode: solves once and stores the session
async fn handle_solve_session(config: &Config) -> anyhow::Result<()> {
    let client = build_http_client(&config.target)?;
    let solver = build_solver(config, client)?;

    let session = solver.solve().await?;
    SessionStore::new(&config.session.path).save(&session)?;

    println!(
        "✓ Session with {} cookies saved to: {}",
        session.cookies.len(),
        config.session.path
    );
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config) -> anyhow::Result<ExitCode> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, stopping after the current step");
            }
            _ = wait_for_sigterm() => {
                tracing::info!("Received SIGTERM, stopping after the current step");
            }
        }
        let _ = shutdown_tx.send(true);
    });

    match crawl(config, shutdown_rx).await? {
        RunOutcome::Completed { stats } => {
            tracing::info!("Crawl completed successfully");
            print_run_summary(&stats);
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::NothingToDo { start, end } => {
            println!("Nothing to do: start {} is past end {}", start, end);
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Interrupted {
            stats,
            last_committed,
        } => {
            match last_committed {
                Some(id) => tracing::info!("Interrupted; progress saved through market {}", id),
                None => tracing::info!("Interrupted before any market was committed"),
            }
            print_run_summary(&stats);
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}
