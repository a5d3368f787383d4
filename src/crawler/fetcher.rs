//! Page fetcher
//!
//! This module handles the HTTP side of the crawl:
//! - Building a client that looks like the mobile storefront's usual visitors
//! - Fetching a market info page with the stored session cookies attached
//! - Failing soft on timeouts by returning whatever body arrived in time

use crate::config::TargetConfig;
use crate::storage::SessionState;
use crate::MarketId;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use url::Url;

/// Errors a fetch can end with
///
/// Timeouts are not errors: they produce partial (possibly empty) markup.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },
}

/// Capability to retrieve the raw markup of a market info page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches the page for `market_id` using `session`
    ///
    /// Must return within roughly `timeout`. On timeout the implementation
    /// returns whatever markup was available instead of an error.
    async fn fetch(
        &self,
        market_id: MarketId,
        session: &SessionState,
        timeout: Duration,
    ) -> Result<String, FetchError>;
}

/// Upper bound on any single request made through [`build_http_client`]
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds an HTTP client presenting the configured mobile browser identity
///
/// # Example
///
/// ```no_run
/// use seller_scout::config::TargetConfig;
/// use seller_scout::crawler::build_http_client;
///
/// let client = build_http_client(&TargetConfig::default()).unwrap();
/// ```
pub fn build_http_client(target: &TargetConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    if let Ok(locale) = HeaderValue::from_str(&target.locale) {
        headers.insert(ACCEPT_LANGUAGE, locale);
    }

    Client::builder()
        .user_agent(target.user_agent.clone())
        .default_headers(headers)
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Page fetcher speaking plain HTTP to the storefront
pub struct HttpPageFetcher {
    client: Client,
    target: TargetConfig,
    host: String,
}

impl HttpPageFetcher {
    pub fn new(client: Client, target: TargetConfig) -> Result<Self, url::ParseError> {
        let host = Url::parse(&target.base_url)?
            .host_str()
            .ok_or(url::ParseError::EmptyHost)?
            .to_string();

        Ok(Self {
            client,
            target,
            host,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(
        &self,
        market_id: MarketId,
        session: &SessionState,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        let url = self.target.market_url(market_id);
        let deadline = Instant::now() + timeout;

        let mut request = self.client.get(&url);
        if let Some(cookies) = session.cookie_header(&self.host) {
            request = request.header(COOKIE, cookies);
        }

        let mut response = match timeout_at(deadline, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => {
                tracing::warn!("[{}] Timeout loading page", market_id);
                return Ok(String::new());
            }
            Ok(Err(source)) => return Err(FetchError::Http { url, source }),
            Err(_) => {
                tracing::warn!("[{}] Timeout loading page", market_id);
                return Ok(String::new());
            }
        };

        // Challenge pages arrive as 403/503, so the status is only logged.
        let status = response.status();
        if !status.is_success() {
            tracing::debug!("[{}] HTTP {}", market_id, status.as_u16());
        }

        let mut body = Vec::new();
        loop {
            match timeout_at(deadline, response.chunk()).await {
                Ok(Ok(Some(chunk))) => body.extend_from_slice(&chunk),
                Ok(Ok(None)) => break,
                Ok(Err(e)) if e.is_timeout() => {
                    tracing::warn!(
                        "[{}] Timeout reading body, keeping {} bytes",
                        market_id,
                        body.len()
                    );
                    break;
                }
                Ok(Err(source)) => return Err(FetchError::Http { url, source }),
                Err(_) => {
                    tracing::warn!(
                        "[{}] Timeout reading body, keeping {} bytes",
                        market_id,
                        body.len()
                    );
                    break;
                }
            }
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
