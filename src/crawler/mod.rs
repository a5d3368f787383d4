//! Crawler module for walking the market identifier range
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching through the stored session with a bounded read
//! - Challenge page detection
//! - Seller field extraction from the info page
//! - Session solving and refresh
//! - Overall crawl coordination and checkpointing

mod coordinator;
mod detector;
mod extractor;
mod fetcher;
mod solver;

pub use coordinator::{
    pacing_delay, run_crawl, Coordinator, CrawlComponents, CrawlSettings, RunOutcome,
};
pub use detector::{classify_markup, PageClass, CHALLENGE_PLATFORM_MARKER, CHALLENGE_TITLE_MARKER};
pub use extractor::{FieldExtractor, SellerInfoExtractor, SELLER_INFO_HEADING};
pub use fetcher::{build_http_client, FetchError, HttpPageFetcher, PageFetcher, REQUEST_TIMEOUT};
pub use solver::{
    build_solver, parse_set_cookie, ChallengeSolver, CommandSolver, HttpSolver, SolverError,
};

use crate::config::Config;
use crate::ScoutError;
use tokio::sync::watch;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Resolve the start identifier from the config or the progress ledger
/// 2. Make sure the result file has its header
/// 3. Load the stored session, solving the challenge if there is none
/// 4. Fetch, extract and record each market in ascending order
/// 5. Checkpoint after every market and pace between requests
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `shutdown` - Receiver that flips to `true` on an interrupt
///
/// # Returns
///
/// * `Ok(RunOutcome)` - How the run ended
/// * `Err(ScoutError)` - A fatal error stopped the run
pub async fn crawl(
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> Result<RunOutcome, ScoutError> {
    run_crawl(config, shutdown).await
}
