use crate::MarketId;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://m.a-bly.com";

pub const DEFAULT_MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";

/// Main configuration structure for Seller-Scout
///
/// Every section is optional in the TOML file; missing values fall back to
/// the defaults below. The only value without a default is the end of the
/// identifier range, which must come from the file or the command line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawl range and pacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// First identifier to process (inclusive); overrides the progress ledger
    #[serde(rename = "start-id", default)]
    pub start_id: Option<MarketId>,

    /// Last identifier to process (inclusive)
    #[serde(rename = "end-id", default)]
    pub end_id: Option<MarketId>,

    /// Lower bound of the randomized pause between identifiers (seconds)
    #[serde(rename = "delay-min", default = "default_delay_min")]
    pub delay_min: f64,

    /// Upper bound of the randomized pause between identifiers (seconds)
    #[serde(rename = "delay-max", default = "default_delay_max")]
    pub delay_max: f64,

    /// Emit a summary line every this many processed identifiers
    #[serde(rename = "summary-every", default = "default_summary_every")]
    pub summary_every: u64,

    /// Upper bound on a single page fetch (milliseconds)
    #[serde(rename = "fetch-timeout-ms", default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl CrawlerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_id: None,
            end_id: None,
            delay_min: default_delay_min(),
            delay_max: default_delay_max(),
            summary_every: default_summary_every(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

/// Storefront being crawled
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Scheme and host of the mobile storefront
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// User agent presented on every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Value sent as Accept-Language
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Market whose page is opened when a fresh session has to be solved
    #[serde(rename = "bootstrap-market-id", default = "default_bootstrap_market_id")]
    pub bootstrap_market_id: MarketId,
}

impl TargetConfig {
    /// URL of the market info page for an identifier
    pub fn market_url(&self, market_id: MarketId) -> String {
        format!(
            "{}/market/{}/info",
            self.base_url.trim_end_matches('/'),
            market_id
        )
    }

    /// URL opened by the challenge solvers
    pub fn bootstrap_url(&self) -> String {
        self.market_url(self.bootstrap_market_id)
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            locale: default_locale(),
            bootstrap_market_id: default_bootstrap_market_id(),
        }
    }
}

/// Anti-bot session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Where the session state is persisted
    #[serde(default = "default_session_path")]
    pub path: String,

    /// External program that solves the challenge and writes the session file.
    ///
    /// When absent the crawler visits the bootstrap page itself and keeps
    /// whatever cookies the storefront hands out.
    #[serde(rename = "solve-command", default)]
    pub solve_command: Option<Vec<String>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
            solve_command: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the CSV result file
    #[serde(rename = "csv-path", default = "default_csv_path")]
    pub csv_path: String,

    /// Path to the progress checkpoint
    #[serde(rename = "progress-path", default = "default_progress_path")]
    pub progress_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            progress_path: default_progress_path(),
        }
    }
}

fn default_delay_min() -> f64 {
    1.8
}

fn default_delay_max() -> f64 {
    3.0
}

fn default_summary_every() -> u64 {
    100
}

fn default_fetch_timeout_ms() -> u64 {
    15_000
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_MOBILE_USER_AGENT.to_string()
}

fn default_locale() -> String {
    "ko-KR".to_string()
}

fn default_bootstrap_market_id() -> MarketId {
    2083
}

fn default_session_path() -> String {
    "session.json".to_string()
}

fn default_csv_path() -> String {
    "sellers.csv".to_string()
}

fn default_progress_path() -> String {
    "progress.json".to_string()
}
