//! Anti-bot session persistence
//!
//! The session is kept in the same JSON shape a browser automation tool
//! exports as its "storage state" (`{"cookies": [...], "origins": [...]}`),
//! so a headful solver script can write it directly. Fields this crate does
//! not interpret are carried through untouched.

use crate::storage::{write_atomic, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A single cookie of the stored browsing context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "root_path")]
    pub path: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn root_path() -> String {
    "/".to_string()
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: root_path(),
            extra: Map::new(),
        }
    }

    /// Returns true if the cookie would be sent to `host`
    ///
    /// A cookie without a domain is treated as host-only for whatever host
    /// the session is used against.
    pub fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.');
        if domain.is_empty() {
            return true;
        }
        let host = host.to_ascii_lowercase();
        let domain = domain.to_ascii_lowercase();
        host == domain || host.ends_with(&format!(".{}", domain))
    }
}

/// Opaque browsing-context state that lets fetches skip the challenge page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub cookies: Vec<SessionCookie>,
    #[serde(default)]
    pub origins: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionState {
    /// Builds a `Cookie` header value for requests to `host`
    pub fn cookie_header(&self, host: &str) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| c.matches_host(host))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}

/// Session state persisted at a fixed path
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored session
    ///
    /// Returns `Ok(None)` when no session exists. A file that cannot be
    /// parsed is also reported as absent, which makes the crawl solve a
    /// fresh session instead of fetching with a broken one. Other read
    /// failures are errors.
    pub fn load(&self) -> StorageResult<Option<SessionState>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::File {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match serde_json::from_str::<SessionState>(&content) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::warn!(
                    "Session file {} is unreadable ({}); a new session will be solved",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    /// Replaces the stored session in full
    pub fn save(&self, state: &SessionState) -> StorageResult<()> {
        let encoded = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path, &encoded).map_err(|source| StorageError::File {
            path: self.path.clone(),
            source,
        })
    }
}
