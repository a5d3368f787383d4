//! Integration tests for the crawler
//!
//! The crawl loop is driven with scripted fetchers and solvers so range,
//! checkpoint and challenge behaviour can be checked exactly. The HTTP
//! fetcher and the HTTP solver are exercised against wiremock servers.

use async_trait::async_trait;
use seller_scout::config::Config;
use seller_scout::crawler::{
    build_http_client, classify_markup, ChallengeSolver, Coordinator, CrawlComponents,
    FetchError, HttpPageFetcher, HttpSolver, PageClass, PageFetcher, RunOutcome,
    SellerInfoExtractor, SolverError,
};
use seller_scout::storage::{
    CsvResultSink, JsonProgressLedger, ProgressLedger, ProgressRecord, ResultRecord, ResultSink,
    SessionCookie, SessionState, SessionStore, StorageError, StorageResult,
};
use seller_scout::{MarketId, ScoutError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHALLENGE_PAGE: &str = r#"<html><head><title>Just a moment...</title></head>
<body><script src="/cdn-cgi/challenge-platform/h/b/orchestrate/jsch/v1"></script></body></html>"#;

fn seller_page(name: &str) -> String {
    format!(
        r#"<html><body>
        <div class="market">Market home</div>
        <section>
            <h2>판매자 정보</h2>
            <p>상호: {name}</p>
            <p>대표자: Kim</p>
            <p>전화번호: 02-1234-5678</p>
        </section>
        </body></html>"#
    )
}

/// Fetcher returning scripted pages and recording every request
#[derive(Default)]
struct StubFetcher {
    scripted: Mutex<HashMap<MarketId, VecDeque<String>>>,
    fetches: Arc<Mutex<Vec<MarketId>>>,
    interrupt_on: Option<(MarketId, watch::Sender<bool>)>,
    hang_on: Option<MarketId>,
}

impl StubFetcher {
    fn script(self, market_id: MarketId, pages: &[&str]) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .insert(market_id, pages.iter().map(|p| p.to_string()).collect());
        self
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(
        &self,
        market_id: MarketId,
        _session: &SessionState,
        _timeout: Duration,
    ) -> Result<String, FetchError> {
        self.fetches.lock().unwrap().push(market_id);

        if let Some((id, tx)) = &self.interrupt_on {
            if *id == market_id {
                tx.send(true).unwrap();
            }
        }
        if self.hang_on == Some(market_id) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&market_id)
            .and_then(|pages| pages.pop_front());
        Ok(scripted.unwrap_or_else(|| seller_page(&format!("Shop {}", market_id))))
    }
}

/// Solver counting its calls
#[derive(Default)]
struct StubSolver {
    calls: Arc<AtomicUsize>,
    fail: bool,
    hang: bool,
}

#[async_trait]
impl ChallengeSolver for StubSolver {
    async fn solve(&self) -> Result<SessionState, SolverError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(SolverError::CommandFailed {
                command: "stub".to_string(),
                status: "exit status: 1".to_string(),
            });
        }
        Ok(SessionState {
            cookies: vec![SessionCookie::new("cf_clearance", format!("solved-{}", n), "")],
            ..SessionState::default()
        })
    }
}

/// File-backed ledger that also records every save
struct RecordingLedger {
    inner: JsonProgressLedger,
    saves: Arc<Mutex<Vec<MarketId>>>,
}

impl ProgressLedger for RecordingLedger {
    fn load(&self) -> Option<ProgressRecord> {
        self.inner.load()
    }

    fn save(&mut self, record: &ProgressRecord) -> StorageResult<()> {
        self.saves.lock().unwrap().push(record.last_id);
        self.inner.save(record)
    }
}

/// CSV sink that refuses rows for some identifiers
struct FailingSink {
    inner: CsvResultSink,
    fail_ids: HashSet<MarketId>,
}

impl ResultSink for FailingSink {
    fn ensure_initialized(&mut self) -> StorageResult<()> {
        self.inner.ensure_initialized()
    }

    fn append(&mut self, record: &ResultRecord) -> StorageResult<()> {
        if self.fail_ids.contains(&record.market_id) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.append(record)
    }
}

/// Temporary workspace holding the config and every persisted file
struct Harness {
    dir: TempDir,
    config: Config,
    saves: Arc<Mutex<Vec<MarketId>>>,
}

impl Harness {
    fn new(end: MarketId) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.crawler.end_id = Some(end);
        config.crawler.delay_min = 0.0;
        config.crawler.delay_max = 0.0;
        config.crawler.fetch_timeout_ms = 1_000;
        config.session.path = path_string(dir.path(), "session.json");
        config.output.csv_path = path_string(dir.path(), "sellers.csv");
        config.output.progress_path = path_string(dir.path(), "progress.json");

        Self {
            dir,
            config,
            saves: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Stores a session so the run does not bootstrap one
    fn with_session(self) -> Self {
        let state = SessionState {
            cookies: vec![SessionCookie::new("cf_clearance", "stored", "")],
            ..SessionState::default()
        };
        SessionStore::new(&self.config.session.path)
            .save(&state)
            .unwrap();
        self
    }

    fn ledger(&self) -> Box<RecordingLedger> {
        Box::new(RecordingLedger {
            inner: JsonProgressLedger::new(&self.config.output.progress_path),
            saves: Arc::clone(&self.saves),
        })
    }

    fn components(
        &self,
        fetcher: StubFetcher,
        solver: StubSolver,
        sink: Box<dyn ResultSink>,
    ) -> CrawlComponents {
        CrawlComponents {
            fetcher: Box::new(fetcher),
            extractor: Box::new(SellerInfoExtractor::new().unwrap()),
            solver: Box::new(solver),
            ledger: self.ledger(),
            sink,
            sessions: SessionStore::new(&self.config.session.path),
        }
    }

    fn csv_sink(&self) -> Box<CsvResultSink> {
        Box::new(CsvResultSink::new(&self.config.output.csv_path))
    }

    async fn run(&self, fetcher: StubFetcher, solver: StubSolver) -> Result<RunOutcome, ScoutError> {
        let components = self.components(fetcher, solver, self.csv_sink());
        let (_tx, rx) = watch::channel(false);
        Coordinator::with_components(&self.config, components, rx)?
            .run()
            .await
    }

    fn saves(&self) -> Vec<MarketId> {
        self.saves.lock().unwrap().clone()
    }

    fn last_id(&self) -> Option<MarketId> {
        JsonProgressLedger::new(&self.config.output.progress_path)
            .load()
            .map(|record| record.last_id)
    }

    /// Result rows as (market_id, business_name)
    fn rows(&self) -> Vec<(MarketId, String)> {
        let mut reader = csv::Reader::from_path(&self.config.output.csv_path).unwrap();
        reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                (r[0].parse().unwrap(), r[1].to_string())
            })
            .collect()
    }
}

fn path_string(dir: &Path, name: &str) -> String {
    dir.join(name).to_string_lossy().into_owned()
}

fn fetch_log(fetcher: &StubFetcher) -> Arc<Mutex<Vec<MarketId>>> {
    Arc::clone(&fetcher.fetches)
}

#[tokio::test]
async fn test_full_range_advances_ledger_once_per_id() {
    let h = Harness::new(5).with_session();
    let fetcher = StubFetcher::default();
    let fetches = fetch_log(&fetcher);

    let outcome = h.run(fetcher, StubSolver::default()).await.unwrap();

    let RunOutcome::Completed { stats } = outcome else {
        panic!("expected a completed run, got {:?}", outcome);
    };
    assert_eq!(stats.succeeded, 5);
    assert_eq!(stats.skipped, 0);
    assert_eq!(h.saves(), vec![1, 2, 3, 4, 5]);
    assert_eq!(*fetches.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    assert_eq!(h.last_id(), Some(5));

    let rows = h.rows();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0], (1, "Shop 1".to_string()));
    assert_eq!(rows[4], (5, "Shop 5".to_string()));
}

#[tokio::test]
async fn test_rerun_after_completion_fetches_nothing() {
    let h = Harness::new(3).with_session();
    h.run(StubFetcher::default(), StubSolver::default())
        .await
        .unwrap();

    let fetcher = StubFetcher::default();
    let fetches = fetch_log(&fetcher);
    let solver = StubSolver::default();
    let solves = Arc::clone(&solver.calls);

    let outcome = h.run(fetcher, solver).await.unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::NothingToDo { start: 4, end: 3 }
    ));
    assert!(fetches.lock().unwrap().is_empty());
    assert_eq!(solves.load(Ordering::SeqCst), 0);
    assert_eq!(h.rows().len(), 3);
}

#[tokio::test]
async fn test_resumes_after_last_committed_id() {
    let h = Harness::new(6).with_session();
    JsonProgressLedger::new(&h.config.output.progress_path)
        .save(&ProgressRecord { last_id: 3 })
        .unwrap();

    let fetcher = StubFetcher::default();
    let fetches = fetch_log(&fetcher);
    h.run(fetcher, StubSolver::default()).await.unwrap();

    assert_eq!(*fetches.lock().unwrap(), vec![4, 5, 6]);
    assert_eq!(h.saves(), vec![4, 5, 6]);
}

#[tokio::test]
async fn test_start_override_ignores_ledger() {
    let mut h = Harness::new(4).with_session();
    JsonProgressLedger::new(&h.config.output.progress_path)
        .save(&ProgressRecord { last_id: 10 })
        .unwrap();
    h.config.crawler.start_id = Some(2);

    let fetcher = StubFetcher::default();
    let fetches = fetch_log(&fetcher);
    h.run(fetcher, StubSolver::default()).await.unwrap();

    assert_eq!(*fetches.lock().unwrap(), vec![2, 3, 4]);
    assert_eq!(h.last_id(), Some(4));
}

#[tokio::test]
async fn test_corrupt_ledger_starts_from_one() {
    let h = Harness::new(2).with_session();
    std::fs::write(&h.config.output.progress_path, "{not json").unwrap();

    let fetcher = StubFetcher::default();
    let fetches = fetch_log(&fetcher);
    h.run(fetcher, StubSolver::default()).await.unwrap();

    assert_eq!(*fetches.lock().unwrap(), vec![1, 2]);
    assert_eq!(h.last_id(), Some(2));
}

#[tokio::test]
async fn test_persistent_challenge_skips_after_one_refresh() {
    let h = Harness::new(3).with_session();
    let fetcher = StubFetcher::default().script(2, &[CHALLENGE_PAGE, CHALLENGE_PAGE]);
    let fetches = fetch_log(&fetcher);
    let solver = StubSolver::default();
    let solves = Arc::clone(&solver.calls);

    let outcome = h.run(fetcher, solver).await.unwrap();

    let RunOutcome::Completed { stats } = outcome else {
        panic!("expected a completed run, got {:?}", outcome);
    };
    assert_eq!(solves.load(Ordering::SeqCst), 1);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.challenge_hits, 1);
    assert_eq!(stats.session_refreshes, 1);
    assert_eq!(*fetches.lock().unwrap(), vec![1, 2, 2, 3]);
    assert_eq!(h.saves(), vec![1, 2, 3]);

    let ids: Vec<MarketId> = h.rows().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test]
async fn test_challenge_recovery_records_after_one_refresh() {
    let h = Harness::new(2).with_session();
    let recovered = seller_page("Recovered");
    let fetcher = StubFetcher::default().script(1, &[CHALLENGE_PAGE, &recovered]);
    let solver = StubSolver::default();
    let solves = Arc::clone(&solver.calls);

    let outcome = h.run(fetcher, solver).await.unwrap();

    let RunOutcome::Completed { stats } = outcome else {
        panic!("expected a completed run, got {:?}", outcome);
    };
    assert_eq!(solves.load(Ordering::SeqCst), 1);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.challenge_hits, 0);
    assert_eq!(stats.session_refreshes, 1);
    assert_eq!(h.rows()[0], (1, "Recovered".to_string()));

    // The refreshed session replaces the stored one
    let stored = SessionStore::new(&h.config.session.path)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(stored.cookies[0].value, "solved-1");
}

#[tokio::test]
async fn test_sink_failure_skips_id_and_continues() {
    let h = Harness::new(4).with_session();
    let sink = Box::new(FailingSink {
        inner: CsvResultSink::new(&h.config.output.csv_path),
        fail_ids: HashSet::from([2]),
    });
    let fetcher = StubFetcher::default();
    let fetches = fetch_log(&fetcher);
    let components = h.components(fetcher, StubSolver::default(), sink);
    let (_tx, rx) = watch::channel(false);

    let outcome = Coordinator::with_components(&h.config, components, rx)
        .unwrap()
        .run()
        .await
        .unwrap();

    let RunOutcome::Completed { stats } = outcome else {
        panic!("expected a completed run, got {:?}", outcome);
    };
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.write_failures, vec![(2, 2)]);
    assert_eq!(stats.write_failure_count(), 1);
    assert_eq!(stats.challenge_hits, 0);
    // Not retried and the ledger still moved past it
    assert_eq!(*fetches.lock().unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(h.saves(), vec![1, 2, 3, 4]);

    let ids: Vec<MarketId> = h.rows().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![1, 3, 4]);
}

#[tokio::test]
async fn test_bootstraps_session_when_none_stored() {
    let h = Harness::new(1);
    let solver = StubSolver::default();
    let solves = Arc::clone(&solver.calls);

    h.run(StubFetcher::default(), solver).await.unwrap();

    assert_eq!(solves.load(Ordering::SeqCst), 1);
    let stored = SessionStore::new(&h.config.session.path)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(stored.cookies[0].value, "solved-1");
}

#[tokio::test]
async fn test_solver_failure_is_fatal() {
    let h = Harness::new(3);
    let fetcher = StubFetcher::default();
    let fetches = fetch_log(&fetcher);
    let solver = StubSolver {
        fail: true,
        ..StubSolver::default()
    };

    let err = h.run(fetcher, solver).await.unwrap_err();

    assert!(matches!(err, ScoutError::Solver(_)));
    assert!(fetches.lock().unwrap().is_empty());
    assert!(h.saves().is_empty());
    assert_eq!(h.last_id(), None);
}

#[tokio::test]
async fn test_nothing_to_do_leaves_output_untouched() {
    let mut h = Harness::new(5);
    h.config.crawler.start_id = Some(9);
    let solver = StubSolver::default();
    let solves = Arc::clone(&solver.calls);

    let outcome = h.run(StubFetcher::default(), solver).await.unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::NothingToDo { start: 9, end: 5 }
    ));
    assert_eq!(solves.load(Ordering::SeqCst), 0);
    assert!(!h.dir.path().join("sellers.csv").exists());
}

#[tokio::test]
async fn test_shutdown_before_start_fetches_nothing() {
    let h = Harness::new(5).with_session();
    let fetcher = StubFetcher::default();
    let fetches = fetch_log(&fetcher);
    let components = h.components(fetcher, StubSolver::default(), h.csv_sink());
    let (_tx, rx) = watch::channel(true);

    let outcome = Coordinator::with_components(&h.config, components, rx)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Interrupted {
            last_committed: None,
            ..
        }
    ));
    assert!(fetches.lock().unwrap().is_empty());
    assert!(h.saves().is_empty());
}

#[tokio::test]
async fn test_interrupt_then_resume_has_no_duplicates() {
    let h = Harness::new(5).with_session();
    let (tx, rx) = watch::channel(false);
    let fetcher = StubFetcher {
        interrupt_on: Some((2, tx)),
        ..StubFetcher::default()
    };
    let components = h.components(fetcher, StubSolver::default(), h.csv_sink());

    let outcome = Coordinator::with_components(&h.config, components, rx)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Interrupted {
            last_committed: Some(2),
            ..
        }
    ));
    assert_eq!(h.last_id(), Some(2));

    let fetcher = StubFetcher::default();
    let fetches = fetch_log(&fetcher);
    h.run(fetcher, StubSolver::default()).await.unwrap();

    assert_eq!(*fetches.lock().unwrap(), vec![3, 4, 5]);
    let ids: Vec<MarketId> = h.rows().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_interrupt_during_pacing_keeps_committed_work() {
    let mut h = Harness::new(5).with_session();
    h.config.crawler.delay_min = 30.0;
    h.config.crawler.delay_max = 30.0;

    let fetcher = StubFetcher::default();
    let fetches = fetch_log(&fetcher);
    let components = h.components(fetcher, StubSolver::default(), h.csv_sink());
    let (tx, rx) = watch::channel(false);
    let mut coordinator = Coordinator::with_components(&h.config, components, rx).unwrap();

    let (outcome, _) = tokio::join!(coordinator.run(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
    });

    assert!(matches!(
        outcome.unwrap(),
        RunOutcome::Interrupted {
            last_committed: Some(1),
            ..
        }
    ));
    assert_eq!(*fetches.lock().unwrap(), vec![1]);
    assert_eq!(h.last_id(), Some(1));
}

#[tokio::test]
async fn test_interrupt_mid_fetch_is_not_recorded() {
    let h = Harness::new(3).with_session();
    let fetcher = StubFetcher {
        hang_on: Some(1),
        ..StubFetcher::default()
    };
    let components = h.components(fetcher, StubSolver::default(), h.csv_sink());
    let (tx, rx) = watch::channel(false);
    let mut coordinator = Coordinator::with_components(&h.config, components, rx).unwrap();

    let (outcome, _) = tokio::join!(coordinator.run(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
    });

    assert!(matches!(
        outcome.unwrap(),
        RunOutcome::Interrupted {
            last_committed: None,
            ..
        }
    ));
    assert!(h.saves().is_empty());
    assert!(h.rows().is_empty());
}

#[tokio::test]
async fn test_interrupt_during_session_refresh_leaves_id_uncommitted() {
    let h = Harness::new(3).with_session();
    let fetcher = StubFetcher::default().script(1, &[CHALLENGE_PAGE]);
    let fetches = fetch_log(&fetcher);
    let solver = StubSolver {
        hang: true,
        ..StubSolver::default()
    };
    let components = h.components(fetcher, solver, h.csv_sink());
    let (tx, rx) = watch::channel(false);
    let mut coordinator = Coordinator::with_components(&h.config, components, rx).unwrap();

    let (outcome, _) = tokio::join!(
        tokio::time::timeout(Duration::from_secs(3), coordinator.run()),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(true).unwrap();
        }
    );

    let outcome = outcome.expect("run must stop once shutdown is requested");
    assert!(matches!(
        outcome.unwrap(),
        RunOutcome::Interrupted {
            last_committed: None,
            ..
        }
    ));
    assert_eq!(*fetches.lock().unwrap(), vec![1]);
    assert!(h.saves().is_empty());
    assert!(h.rows().is_empty());

    // The stored session is left alone
    let stored = SessionStore::new(&h.config.session.path)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(stored.cookies[0].value, "stored");
}

#[tokio::test]
async fn test_interrupt_during_first_session_solve() {
    let h = Harness::new(3);
    let fetcher = StubFetcher::default();
    let fetches = fetch_log(&fetcher);
    let solver = StubSolver {
        hang: true,
        ..StubSolver::default()
    };
    let components = h.components(fetcher, solver, h.csv_sink());
    let (tx, rx) = watch::channel(false);
    let mut coordinator = Coordinator::with_components(&h.config, components, rx).unwrap();

    let (outcome, _) = tokio::join!(
        tokio::time::timeout(Duration::from_secs(3), coordinator.run()),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(true).unwrap();
        }
    );

    let outcome = outcome.expect("run must stop once shutdown is requested");
    assert!(matches!(
        outcome.unwrap(),
        RunOutcome::Interrupted {
            last_committed: None,
            ..
        }
    ));
    assert!(fetches.lock().unwrap().is_empty());
    assert!(h.saves().is_empty());
    assert!(!h.dir.path().join("session.json").exists());
}

// HTTP collaborators against a mock storefront

fn http_config(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.target.base_url = server.uri();
    config.target.bootstrap_market_id = 99;
    config.crawler.end_id = Some(2);
    config.crawler.delay_min = 0.0;
    config.crawler.delay_max = 0.0;
    config.crawler.fetch_timeout_ms = 2_000;
    config.session.path = path_string(dir, "session.json");
    config.output.csv_path = path_string(dir, "sellers.csv");
    config.output.progress_path = path_string(dir, "progress.json");
    config
}

fn http_fetcher(config: &Config) -> HttpPageFetcher {
    let client = build_http_client(&config.target).unwrap();
    HttpPageFetcher::new(client, config.target.clone()).unwrap()
}

#[tokio::test]
async fn test_http_fetcher_returns_challenge_body_for_403() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/market/7/info"))
        .respond_with(ResponseTemplate::new(403).set_body_string(CHALLENGE_PAGE))
        .mount(&server)
        .await;

    let markup = http_fetcher(&config)
        .fetch(7, &SessionState::default(), Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(classify_markup(&markup), PageClass::Challenge);
}

#[tokio::test]
async fn test_http_fetcher_sends_session_cookies() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/market/3/info"))
        .and(header("cookie", "cf_clearance=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(seller_page("Acme")))
        .expect(1)
        .mount(&server)
        .await;

    let session = SessionState {
        cookies: vec![
            SessionCookie::new("cf_clearance", "abc", ""),
            SessionCookie::new("other", "x", "elsewhere.example"),
        ],
        ..SessionState::default()
    };
    let markup = http_fetcher(&config)
        .fetch(3, &session, Duration::from_secs(2))
        .await
        .unwrap();

    assert!(markup.contains("Acme"));
}

#[tokio::test]
async fn test_http_fetcher_timeout_yields_empty_markup() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/market/5/info"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(seller_page("Slow"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let markup = http_fetcher(&config)
        .fetch(5, &SessionState::default(), Duration::from_millis(200))
        .await
        .unwrap();

    assert_eq!(markup, "");
    assert_eq!(classify_markup(&markup), PageClass::Content);
}

#[tokio::test]
async fn test_http_fetcher_connection_failure_is_an_error() {
    let mut config = Config::default();
    config.target.base_url = "http://127.0.0.1:1".to_string();

    let result = http_fetcher(&config)
        .fetch(1, &SessionState::default(), Duration::from_secs(2))
        .await;

    assert!(matches!(result, Err(FetchError::Http { .. })));
}

#[tokio::test]
async fn test_http_solver_captures_set_cookie() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/market/99/info"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "cf_clearance=fresh; Path=/; HttpOnly")
                .set_body_string("<html></html>"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = http_config(&server, dir.path());
    let client = build_http_client(&config.target).unwrap();
    let session = HttpSolver::new(client, config.target.bootstrap_url(), Duration::from_secs(2))
        .unwrap()
        .solve()
        .await
        .unwrap();

    assert_eq!(session.cookies.len(), 1);
    assert_eq!(session.cookies[0].name, "cf_clearance");
    assert_eq!(session.cookies[0].value, "fresh");
    assert_eq!(session.cookies[0].domain, "127.0.0.1");
}

#[tokio::test]
async fn test_end_to_end_against_mock_storefront() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/market/99/info"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "cf_clearance=fresh; Path=/")
                .set_body_string("<html></html>"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/market/1/info"))
        .and(header("cookie", "cf_clearance=fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_string(seller_page("Acme")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/market/2/info"))
        .respond_with(ResponseTemplate::new(503).set_body_string(CHALLENGE_PAGE))
        .mount(&server)
        .await;

    let (_tx, rx) = watch::channel(false);
    let outcome = seller_scout::crawler::crawl(&config, rx).await.unwrap();

    let RunOutcome::Completed { stats } = outcome else {
        panic!("expected a completed run, got {:?}", outcome);
    };
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.challenge_hits, 1);
    assert_eq!(stats.session_refreshes, 1);

    let mut reader = csv::Reader::from_path(&config.output.csv_path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][0], "1");
    assert_eq!(&rows[0][1], "Acme");
    assert_eq!(&rows[0][2], "Kim");
    assert_eq!(&rows[0][8], config.target.market_url(1));

    let progress = std::fs::read_to_string(&config.output.progress_path).unwrap();
    assert_eq!(progress.trim(), r#"{"last_id":2}"#);
    assert!(SessionStore::new(&config.session.path).load().unwrap().is_some());
}

fn http_solver(config: &Config, timeout: Duration) -> HttpSolver {
    let client = build_http_client(&config.target).unwrap();
    HttpSolver::new(client, config.target.bootstrap_url(), timeout).unwrap()
}

#[tokio::test]
async fn test_http_solver_times_out_on_stalled_bootstrap() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/market/99/info"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "cf_clearance=late; Path=/")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        http_solver(&config, Duration::from_millis(300)).solve(),
    )
    .await
    .expect("solver must give up on its own");

    assert!(matches!(result, Err(SolverError::Timeout { .. })));
}

#[tokio::test]
async fn test_http_solver_fails_when_bootstrap_is_challenged() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/market/99/info"))
        .respond_with(ResponseTemplate::new(403).set_body_string(CHALLENGE_PAGE))
        .mount(&server)
        .await;

    let result = http_solver(&config, Duration::from_secs(2)).solve().await;

    assert!(matches!(
        result,
        Err(SolverError::StillChallenged { status: 403, .. })
    ));
}

#[tokio::test]
async fn test_http_solver_rejects_error_status_without_cookies() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/market/99/info"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = http_solver(&config, Duration::from_secs(2)).solve().await;

    assert!(matches!(
        result,
        Err(SolverError::Rejected { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_http_solver_accepts_success_without_cookies() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/market/99/info"))
        .respond_with(ResponseTemplate::new(200).set_body_string(seller_page("Open")))
        .mount(&server)
        .await;

    let session = http_solver(&config, Duration::from_secs(2))
        .solve()
        .await
        .unwrap();

    assert!(session.cookies.is_empty());
}

#[tokio::test]
async fn test_challenged_bootstrap_stops_the_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = http_config(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/market/99/info"))
        .respond_with(ResponseTemplate::new(403).set_body_string(CHALLENGE_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/market/1/info"))
        .respond_with(ResponseTemplate::new(200).set_body_string(seller_page("Acme")))
        .expect(0)
        .mount(&server)
        .await;

    let (_tx, rx) = watch::channel(false);
    let err = seller_scout::crawler::crawl(&config, rx).await.unwrap_err();

    assert!(matches!(
        err,
        ScoutError::Solver(SolverError::StillChallenged { .. })
    ));
    assert!(!dir.path().join("progress.json").exists());
    assert!(!dir.path().join("session.json").exists());
}
