//! In-memory run statistics
//!
//! Counters are reset every run and only feed the progress lines and the
//! end-of-run summary; nothing here is persisted.

use crate::state::{MarketOutcome, SkipReason};
use crate::MarketId;
use std::time::{Duration, Instant};

/// Counters for the current run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    /// First identifier of this run
    pub start_id: MarketId,

    /// Identifiers whose row was written
    pub succeeded: u64,

    /// Identifiers given up on, for any reason
    pub skipped: u64,

    /// Identifiers skipped because the challenge survived a refresh
    pub challenge_hits: u64,

    /// Session refreshes triggered by a challenge page
    pub session_refreshes: u64,

    /// Identifiers whose row could not be written, as ascending inclusive
    /// ranges; never retried automatically
    pub write_failures: Vec<(MarketId, MarketId)>,

    started: Instant,
}

impl RunStatistics {
    pub fn new(start_id: MarketId) -> Self {
        Self {
            start_id,
            succeeded: 0,
            skipped: 0,
            challenge_hits: 0,
            session_refreshes: 0,
            write_failures: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Counts the terminal outcome of one identifier
    pub fn record(&mut self, market_id: MarketId, outcome: MarketOutcome) {
        match outcome {
            MarketOutcome::Recorded => self.succeeded += 1,
            MarketOutcome::Skipped(reason) => {
                self.skipped += 1;
                match reason {
                    SkipReason::PersistentChallenge => self.challenge_hits += 1,
                    SkipReason::WriteFailed => self.record_write_failure(market_id),
                }
            }
        }
    }

    fn record_write_failure(&mut self, market_id: MarketId) {
        match self.write_failures.last_mut() {
            Some((_, last)) if last.checked_add(1) == Some(market_id) => *last = market_id,
            _ => self.write_failures.push((market_id, market_id)),
        }
    }

    /// Number of identifiers whose row could not be written
    pub fn write_failure_count(&self) -> u64 {
        self.write_failures
            .iter()
            .map(|(first, last)| last - first + 1)
            .sum()
    }

    /// Identifiers that reached a terminal state in this run
    pub fn processed(&self) -> u64 {
        self.succeeded + self.skipped
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Processed identifiers per minute
    pub fn rate_per_minute(&self) -> f64 {
        rate_per_minute(self.processed(), self.elapsed())
    }
}

fn rate_per_minute(processed: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        processed as f64 / secs * 60.0
    } else {
        0.0
    }
}

/// Failed-write ranges listed in the end-of-run summary
const MAX_LISTED_RANGES: usize = 50;

/// Formats a duration as `H:MM:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Logs the per-identifier progress line
pub fn log_progress(market_id: MarketId, outcome: MarketOutcome, stats: &RunStatistics) {
    let tag = match outcome {
        MarketOutcome::Recorded => "OK",
        MarketOutcome::Skipped(_) => "SKIP",
    };
    tracing::info!(
        "[{}] {} | ok={} skip={} cf={} | rate={:.1}/min elapsed={}",
        tag,
        market_id,
        stats.succeeded,
        stats.skipped,
        stats.challenge_hits,
        stats.rate_per_minute(),
        format_elapsed(stats.elapsed())
    );
}

/// Logs the periodic summary line
pub fn log_summary(stats: &RunStatistics) {
    tracing::info!(
        "[SUMMARY] done={} ok={} skip={} cf={} refreshes={} elapsed={}",
        stats.processed(),
        stats.succeeded,
        stats.skipped,
        stats.challenge_hits,
        stats.session_refreshes,
        format_elapsed(stats.elapsed())
    );
}

/// Prints the end-of-run summary to stdout
pub fn print_run_summary(stats: &RunStatistics) {
    println!("=== Run Summary ===\n");
    println!("  Started at market:   {}", stats.start_id);
    println!("  Processed:           {}", stats.processed());
    println!("  Recorded:            {}", stats.succeeded);
    println!("  Skipped:             {}", stats.skipped);
    println!("  Persistent challenge: {}", stats.challenge_hits);
    println!("  Session refreshes:   {}", stats.session_refreshes);
    println!("  Elapsed:             {}", format_elapsed(stats.elapsed()));
    println!("  Rate:                {:.1}/min", stats.rate_per_minute());

    if !stats.write_failures.is_empty() {
        println!(
            "\nRows that could not be written ({}), re-run these with --start:",
            stats.write_failure_count()
        );
        for (first, last) in stats.write_failures.iter().take(MAX_LISTED_RANGES) {
            if first == last {
                println!("  - {}", first);
            } else {
                println!("  - {}..={}", first, last);
            }
        }
        let hidden = stats.write_failures.len().saturating_sub(MAX_LISTED_RANGES);
        if hidden > 0 {
            println!("  ... and {} more ranges", hidden);
        }
    }
}
