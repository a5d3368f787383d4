//! Challenge solving
//!
//! Solving the anti-bot challenge happens out of band: either an external
//! program (typically a headful browser script run under a virtual display)
//! writes the session file, or the crawler visits the bootstrap page itself
//! and keeps the cookies it is handed. Both produce a full [`SessionState`]
//! that replaces the stored one.

use crate::config::Config;
use crate::crawler::detector::{classify_markup, PageClass};
use crate::storage::{SessionCookie, SessionState, SessionStore, StorageError};
use async_trait::async_trait;
use reqwest::header::SET_COOKIE;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use url::Url;

/// Errors a challenge solve can end with; all of them stop the crawl
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Could not start solve command '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Solve command '{command}' exited with {status}")]
    CommandFailed { command: String, status: String },

    #[error("Solve command finished but no session was written to {}", path.display())]
    NoSession { path: PathBuf },

    #[error("Bootstrap request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Bootstrap request to {url} did not finish within {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Bootstrap page {url} still served the challenge (HTTP {status})")]
    StillChallenged { url: String, status: u16 },

    #[error("Bootstrap page {url} answered HTTP {status} without setting any cookie")]
    Rejected { url: String, status: u16 },

    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Capability to obtain a fresh session that passes the challenge
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    async fn solve(&self) -> Result<SessionState, SolverError>;
}

/// Runs an external program that solves the challenge and writes the
/// session file
///
/// The program receives the session path, the page to open and the user
/// agent through `SCOUT_SESSION_PATH`, `SCOUT_BOOTSTRAP_URL` and
/// `SCOUT_USER_AGENT`.
pub struct CommandSolver {
    program: String,
    args: Vec<String>,
    store: SessionStore,
    bootstrap_url: String,
    user_agent: String,
}

impl CommandSolver {
    pub fn new(
        command: &[String],
        store: SessionStore,
        bootstrap_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            store,
            bootstrap_url: bootstrap_url.into(),
            user_agent: user_agent.into(),
        })
    }

    fn display_command(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl ChallengeSolver for CommandSolver {
    async fn solve(&self) -> Result<SessionState, SolverError> {
        let command = self.display_command();
        tracing::info!("Solving challenge with: {}", command);

        let status = Command::new(&self.program)
            .args(&self.args)
            .env("SCOUT_SESSION_PATH", self.store.path())
            .env("SCOUT_BOOTSTRAP_URL", &self.bootstrap_url)
            .env("SCOUT_USER_AGENT", &self.user_agent)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| SolverError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !status.success() {
            return Err(SolverError::CommandFailed {
                command,
                status: status.to_string(),
            });
        }

        self.store
            .load()?
            .ok_or_else(|| SolverError::NoSession {
                path: self.store.path().to_path_buf(),
            })
    }
}

/// Visits the bootstrap page and keeps the cookies the storefront sets
///
/// The solve fails if the page still carries the challenge, or if it answers
/// with an error status and no cookie. A success status without cookies is
/// accepted with a warning.
pub struct HttpSolver {
    client: Client,
    bootstrap_url: String,
    host: String,
    timeout: Duration,
}

impl HttpSolver {
    pub fn new(
        client: Client,
        bootstrap_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, url::ParseError> {
        let bootstrap_url = bootstrap_url.into();
        let host = Url::parse(&bootstrap_url)?
            .host_str()
            .ok_or(url::ParseError::EmptyHost)?
            .to_string();

        Ok(Self {
            client,
            bootstrap_url,
            host,
            timeout,
        })
    }

    async fn bootstrap(&self) -> Result<SessionState, SolverError> {
        let http_error = |source| SolverError::Http {
            url: self.bootstrap_url.clone(),
            source,
        };

        let response = self
            .client
            .get(&self.bootstrap_url)
            .send()
            .await
            .map_err(http_error)?;
        let status = response.status();

        let cookies: Vec<SessionCookie> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| parse_set_cookie(value, &self.host))
            .collect();

        let body = response.text().await.map_err(http_error)?;
        if classify_markup(&body) == PageClass::Challenge {
            return Err(SolverError::StillChallenged {
                url: self.bootstrap_url.clone(),
                status: status.as_u16(),
            });
        }

        if cookies.is_empty() {
            if !status.is_success() {
                return Err(SolverError::Rejected {
                    url: self.bootstrap_url.clone(),
                    status: status.as_u16(),
                });
            }
            tracing::warn!(
                "Bootstrap page {} set no cookies; continuing without a session",
                self.bootstrap_url
            );
        } else {
            tracing::info!("Captured {} session cookies", cookies.len());
        }

        Ok(SessionState {
            cookies,
            ..SessionState::default()
        })
    }
}

#[async_trait]
impl ChallengeSolver for HttpSolver {
    async fn solve(&self) -> Result<SessionState, SolverError> {
        tracing::info!("Opening {} to obtain a session", self.bootstrap_url);

        match tokio::time::timeout(self.timeout, self.bootstrap()).await {
            Ok(result) => result,
            Err(_) => Err(SolverError::Timeout {
                url: self.bootstrap_url.clone(),
                timeout: self.timeout,
            }),
        }
    }
}

/// Parses a `Set-Cookie` header value into a session cookie
///
/// Only the name/value pair and the `Domain`/`Path` attributes are kept;
/// a cookie without `Domain` is scoped to `default_domain`.
pub fn parse_set_cookie(header: &str, default_domain: &str) -> Option<SessionCookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = SessionCookie::new(name, value.trim(), default_domain);
    for attribute in parts {
        let (key, val) = attribute.split_once('=').unwrap_or((attribute, ""));
        match key.trim().to_ascii_lowercase().as_str() {
            "domain" if !val.trim().is_empty() => cookie.domain = val.trim().to_string(),
            "path" if !val.trim().is_empty() => cookie.path = val.trim().to_string(),
            _ => {}
        }
    }
    Some(cookie)
}

/// Picks the solver the configuration asks for
pub fn build_solver(
    config: &Config,
    client: Client,
) -> Result<Box<dyn ChallengeSolver>, url::ParseError> {
    let store = SessionStore::new(&config.session.path);
    let bootstrap_url = config.target.bootstrap_url();

    if let Some(command) = config.session.solve_command.as_deref() {
        if let Some(solver) =
            CommandSolver::new(command, store, &bootstrap_url, &config.target.user_agent)
        {
            return Ok(Box::new(solver));
        }
    }

    Ok(Box::new(HttpSolver::new(
        client,
        bootstrap_url,
        config.crawler.fetch_timeout(),
    )?))
}
