//! Storage traits and error types
//!
//! The crawl loop only talks to the ledger and the sink through these traits,
//! so alternative backends (or test doubles) can be swapped in.

use crate::storage::{ProgressRecord, ResultRecord};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error on {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable single-record checkpoint of the last fully handled identifier
pub trait ProgressLedger {
    /// Reads the checkpoint
    ///
    /// Never fails: a missing or unreadable record is reported as `None`
    /// so the crawl falls back to its default start.
    fn load(&self) -> Option<ProgressRecord>;

    /// Replaces the checkpoint atomically
    ///
    /// A reader must never observe a partially written record, even if the
    /// process dies during the call.
    fn save(&mut self, record: &ProgressRecord) -> StorageResult<()>;
}

/// Append-only durable store of result rows
pub trait ResultSink {
    /// Creates the destination with its header row if it does not exist yet
    ///
    /// Existing data is never truncated or rewritten.
    fn ensure_initialized(&mut self) -> StorageResult<()>;

    /// Appends exactly one row and flushes it before returning
    fn append(&mut self, record: &ResultRecord) -> StorageResult<()>;
}
