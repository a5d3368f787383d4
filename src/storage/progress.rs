//! JSON progress ledger
//!
//! The ledger is a single `{"last_id": n}` document. It is rewritten through
//! [`write_atomic`] after every identifier, so a crash loses at most the
//! identifier that was in flight.

use crate::storage::{write_atomic, ProgressLedger, ProgressRecord, StorageError, StorageResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Progress ledger backed by a JSON file at a fixed path
#[derive(Debug, Clone)]
pub struct JsonProgressLedger {
    path: PathBuf,
}

impl JsonProgressLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressLedger for JsonProgressLedger {
    fn load(&self) -> Option<ProgressRecord> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(
                    "Could not read progress ledger {}: {}; starting without it",
                    self.path.display(),
                    e
                );
                return None;
            }
        };

        match serde_json::from_str::<ProgressRecord>(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    "Progress ledger {} is corrupt ({}); starting without it",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    fn save(&mut self, record: &ProgressRecord) -> StorageResult<()> {
        let encoded = serde_json::to_vec(record)?;
        write_atomic(&self.path, &encoded).map_err(|source| StorageError::File {
            path: self.path.clone(),
            source,
        })
    }
}
