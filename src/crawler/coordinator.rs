//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that walks the identifier range:
//! - Resolving the start identifier from the caller or the progress ledger
//! - Bootstrapping and refreshing the anti-bot session
//! - Fetching, classifying and extracting each market page
//! - Committing every identifier to the ledger before the next one starts
//! - Pacing requests and honouring interrupts

use crate::config::{Config, TargetConfig};
use crate::crawler::detector::{classify_markup, PageClass};
use crate::crawler::extractor::{FieldExtractor, SellerInfoExtractor};
use crate::crawler::fetcher::{build_http_client, HttpPageFetcher, PageFetcher};
use crate::crawler::solver::{build_solver, ChallengeSolver};
use crate::output::stats::{log_progress, log_summary, RunStatistics};
use crate::state::{MarketOutcome, MarketState, SkipReason};
use crate::storage::{
    CsvResultSink, JsonProgressLedger, ProgressLedger, ProgressRecord, ResultRecord, ResultSink,
    SessionState, SessionStore,
};
use crate::{ConfigError, MarketId, ScoutError};
use rand::Rng;
use std::time::Duration;
use tokio::sync::watch;

/// Range and pacing settings resolved from the configuration
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Caller-supplied start; when set the ledger is not consulted
    pub start_override: Option<MarketId>,
    pub end_id: MarketId,
    pub delay_min: Duration,
    pub delay_max: Duration,
    pub summary_every: u64,
    pub fetch_timeout: Duration,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let crawler = &config.crawler;
        let end_id = crawler
            .end_id
            .ok_or_else(|| ConfigError::Validation("end-id is required".to_string()))?;

        let delay = |secs: f64, name: &str| {
            Duration::try_from_secs_f64(secs)
                .map_err(|e| ConfigError::Validation(format!("{} is not a valid delay: {}", name, e)))
        };

        Ok(Self {
            start_override: crawler.start_id,
            end_id,
            delay_min: delay(crawler.delay_min, "delay-min")?,
            delay_max: delay(crawler.delay_max, "delay-max")?,
            summary_every: crawler.summary_every.max(1),
            fetch_timeout: crawler.fetch_timeout(),
        })
    }
}

/// Collaborators the coordinator drives
pub struct CrawlComponents {
    pub fetcher: Box<dyn PageFetcher>,
    pub extractor: Box<dyn FieldExtractor>,
    pub solver: Box<dyn ChallengeSolver>,
    pub ledger: Box<dyn ProgressLedger>,
    pub sink: Box<dyn ResultSink>,
    pub sessions: SessionStore,
}

impl CrawlComponents {
    /// Builds the HTTP-backed components described by the configuration
    pub fn from_config(config: &Config) -> Result<Self, ScoutError> {
        let client = build_http_client(&config.target)?;

        Ok(Self {
            fetcher: Box::new(HttpPageFetcher::new(client.clone(), config.target.clone())?),
            extractor: Box::new(SellerInfoExtractor::new()?),
            solver: build_solver(config, client)?,
            ledger: Box::new(JsonProgressLedger::new(&config.output.progress_path)),
            sink: Box::new(CsvResultSink::new(&config.output.csv_path)),
            sessions: SessionStore::new(&config.session.path),
        })
    }
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Every identifier up to the end of the range was handled
    Completed { stats: RunStatistics },

    /// The resolved start was already past the end of the range
    NothingToDo { start: MarketId, end: MarketId },

    /// An interrupt arrived; `last_committed` is the last identifier saved
    /// to the ledger during this run
    Interrupted {
        stats: RunStatistics,
        last_committed: Option<MarketId>,
    },
}

/// Main crawler coordinator structure
pub struct Coordinator {
    settings: CrawlSettings,
    target: TargetConfig,
    fetcher: Box<dyn PageFetcher>,
    extractor: Box<dyn FieldExtractor>,
    solver: Box<dyn ChallengeSolver>,
    ledger: Box<dyn ProgressLedger>,
    sink: Box<dyn ResultSink>,
    sessions: SessionStore,
    shutdown: watch::Receiver<bool>,
}

impl Coordinator {
    /// Creates a coordinator with the HTTP-backed components
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `shutdown` - Flips to `true` when the run should stop
    pub fn new(config: &Config, shutdown: watch::Receiver<bool>) -> Result<Self, ScoutError> {
        let components = CrawlComponents::from_config(config)?;
        Self::with_components(config, components, shutdown)
    }

    /// Creates a coordinator around caller-provided components
    pub fn with_components(
        config: &Config,
        components: CrawlComponents,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, ScoutError> {
        Ok(Self {
            settings: CrawlSettings::from_config(config)?,
            target: config.target.clone(),
            fetcher: components.fetcher,
            extractor: components.extractor,
            solver: components.solver,
            ledger: components.ledger,
            sink: components.sink,
            sessions: components.sessions,
            shutdown,
        })
    }

    /// Determines the first identifier of this run
    ///
    /// A caller-supplied start wins; otherwise the run resumes after the
    /// ledger's `last_id`, or at 1 when there is no usable record.
    pub fn resolve_start(&self) -> MarketId {
        let start = match self.settings.start_override {
            Some(start) => start,
            None => self
                .ledger
                .load()
                .map_or(1, |record| record.last_id.saturating_add(1)),
        };
        start.max(1)
    }

    /// Runs the crawl loop until the range is exhausted or an interrupt arrives
    pub async fn run(&mut self) -> Result<RunOutcome, ScoutError> {
        let start = self.resolve_start();
        let end = self.settings.end_id;

        if start > end {
            tracing::info!("Nothing to do (start {} > end {})", start, end);
            return Ok(RunOutcome::NothingToDo { start, end });
        }

        tracing::info!("Crawling markets {}..={}", start, end);
        self.sink.ensure_initialized()?;

        let mut session = match self.sessions.load()? {
            Some(session) => session,
            None => {
                tracing::info!(
                    "No session at {}; solving the challenge once before crawling",
                    self.sessions.path().display()
                );
                match self.refresh_session().await? {
                    Some(session) => session,
                    None => {
                        tracing::info!("Interrupted while obtaining the first session");
                        return Ok(RunOutcome::Interrupted {
                            stats: RunStatistics::new(start),
                            last_committed: None,
                        });
                    }
                }
            }
        };

        let mut stats = RunStatistics::new(start);
        let mut last_committed = None;
        let mut current = start;

        while current <= end {
            if self.is_interrupted() {
                return Ok(RunOutcome::Interrupted {
                    stats,
                    last_committed,
                });
            }

            let outcome = match self.process_market(current, &mut session, &mut stats).await? {
                Some(outcome) => outcome,
                None => {
                    tracing::info!("[{}] Interrupted before the market was handled", current);
                    return Ok(RunOutcome::Interrupted {
                        stats,
                        last_committed,
                    });
                }
            };

            stats.record(current, outcome);
            self.ledger.save(&ProgressRecord { last_id: current })?;
            last_committed = Some(current);

            log_progress(current, outcome, &stats);
            if stats.processed() % self.settings.summary_every == 0 {
                log_summary(&stats);
            }

            if current == end {
                break;
            }
            if self.pace().await {
                return Ok(RunOutcome::Interrupted {
                    stats,
                    last_committed,
                });
            }
            current += 1;
        }

        tracing::info!("Completed range up to market {}", end);
        Ok(RunOutcome::Completed { stats })
    }

    /// Drives one identifier to a terminal state
    ///
    /// Returns `None` if an interrupt arrived while a fetch or a session
    /// refresh was in flight; the identifier is then left for the next run.
    async fn process_market(
        &mut self,
        market_id: MarketId,
        session: &mut SessionState,
        stats: &mut RunStatistics,
    ) -> Result<Option<MarketOutcome>, ScoutError> {
        let source_url = self.target.market_url(market_id);
        let mut state = MarketState::Fetching;
        tracing::info!("[{}] GET {}", market_id, source_url);

        let Some(mut markup) = self.fetch_interruptible(market_id, session).await? else {
            return Ok(None);
        };

        if classify_markup(&markup) == PageClass::Challenge {
            transition(market_id, &mut state, MarketState::Challenged)?;
            tracing::warn!("[{}] Challenge detected, refreshing session and retrying", market_id);

            *session = match self.refresh_session().await? {
                Some(fresh) => fresh,
                None => return Ok(None),
            };
            stats.session_refreshes += 1;

            transition(market_id, &mut state, MarketState::Refetching)?;
            markup = match self.fetch_interruptible(market_id, session).await? {
                Some(markup) => markup,
                None => return Ok(None),
            };

            if classify_markup(&markup) == PageClass::Challenge {
                transition(market_id, &mut state, MarketState::Skipped)?;
                tracing::warn!("[{}] Challenge persists after refresh, skipping", market_id);
                return Ok(Some(MarketOutcome::Skipped(SkipReason::PersistentChallenge)));
            }
        }

        transition(market_id, &mut state, MarketState::Extracting)?;
        let record = ResultRecord {
            market_id,
            fields: self.extractor.extract(&markup),
            source_url,
            scraped_at: chrono::Utc::now().timestamp(),
        };
        if record.fields.is_empty() {
            tracing::debug!("[{}] No seller fields found", market_id);
        }

        match self.sink.append(&record) {
            Ok(()) => {
                transition(market_id, &mut state, MarketState::Recorded)?;
                Ok(Some(MarketOutcome::Recorded))
            }
            Err(e) => {
                transition(market_id, &mut state, MarketState::Skipped)?;
                tracing::warn!(
                    "[{}] Could not write result row ({}); skipping without retry",
                    market_id,
                    e
                );
                Ok(Some(MarketOutcome::Skipped(SkipReason::WriteFailed)))
            }
        }
    }

    /// Fetches a page unless an interrupt arrives first
    async fn fetch_interruptible(
        &mut self,
        market_id: MarketId,
        session: &SessionState,
    ) -> Result<Option<String>, ScoutError> {
        let fetch = self
            .fetcher
            .fetch(market_id, session, self.settings.fetch_timeout);

        tokio::select! {
            result = fetch => Ok(Some(result?)),
            _ = wait_for_shutdown(&mut self.shutdown) => Ok(None),
        }
    }

    /// Solves a fresh session and replaces the stored one
    ///
    /// Returns `None` if an interrupt arrived before the solver finished. The
    /// solve is dropped then, which also kills an external solver process.
    async fn refresh_session(&mut self) -> Result<Option<SessionState>, ScoutError> {
        let solve = self.solver.solve();
        let session = tokio::select! {
            result = solve => result?,
            _ = wait_for_shutdown(&mut self.shutdown) => return Ok(None),
        };

        self.sessions.save(&session)?;
        tracing::info!("Session saved to {}", self.sessions.path().display());
        Ok(Some(session))
    }

    /// Sleeps a random pacing interval; returns true if interrupted meanwhile
    async fn pace(&mut self) -> bool {
        let delay = pacing_delay(self.settings.delay_min, self.settings.delay_max);
        tracing::debug!("Pausing {:.2}s", delay.as_secs_f64());

        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            _ = wait_for_shutdown(&mut self.shutdown) => true,
        }
    }

    fn is_interrupted(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Moves `state` to `next`, rejecting steps the state machine does not allow
fn transition(
    market_id: MarketId,
    state: &mut MarketState,
    next: MarketState,
) -> Result<(), ScoutError> {
    if !state.can_transition_to(next) {
        return Err(ScoutError::InvalidTransition {
            id: market_id,
            from: *state,
            to: next,
        });
    }
    tracing::trace!("[{}] {} -> {}", market_id, state, next);
    *state = next;
    Ok(())
}

/// Draws a pacing interval uniformly from `[min, max]`
pub fn pacing_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let secs = rand::thread_rng().gen_range(min.as_secs_f64()..=max.as_secs_f64());
    Duration::from_secs_f64(secs)
}

/// Resolves once the shutdown flag is set
///
/// If every sender is gone no shutdown can arrive, so this never resolves.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Runs a crawl with the HTTP-backed components
///
/// # Example
///
/// ```no_run
/// use seller_scout::config::load_config;
/// use seller_scout::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("scout.toml"))?;
/// let (_tx, rx) = tokio::sync::watch::channel(false);
/// run_crawl(&config, rx).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> Result<RunOutcome, ScoutError> {
    let mut coordinator = Coordinator::new(config, shutdown)?;
    coordinator.run().await
}
