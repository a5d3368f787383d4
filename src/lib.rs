//! Seller-Scout: a resumable seller-registration crawler
//!
//! This crate walks a numeric range of storefront market identifiers, fetches
//! each market's info page through a stored anti-bot session, extracts the
//! seller-registration fields and appends them to a CSV file, checkpointing
//! progress after every identifier so an interrupted run resumes where it
//! stopped.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Numeric storefront identifier walked by the crawler
pub type MarketId = u64;

/// Main error type for Seller-Scout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Session solve failed: {0}")]
    Solver(#[from] crawler::SolverError),

    #[error("Invalid state transition for market {id}: {from} -> {to}")]
    InvalidTransition {
        id: MarketId,
        from: state::MarketState,
        to: state::MarketState,
    },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Seller-Scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, RunOutcome};
pub use state::{MarketOutcome, MarketState, SkipReason};
pub use storage::{ProgressRecord, ResultRecord, SellerFields};
