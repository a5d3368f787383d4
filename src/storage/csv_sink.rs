//! Append-only CSV result sink
//!
//! Each append opens the file, writes one row, flushes and syncs it, and
//! closes the handle again. Nothing is buffered between calls, so a killed
//! process never loses a row that was reported as written.

use crate::storage::{ResultRecord, ResultSink, StorageError, StorageResult, CSV_HEADER};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Result sink writing UTF-8 CSV rows to a file
#[derive(Debug, Clone)]
pub struct CsvResultSink {
    path: PathBuf,
}

impl CsvResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the file is missing or has no bytes yet
    fn needs_header(&self) -> StorageResult<bool> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(source) => Err(self.file_error(source)),
        }
    }

    fn open_for_append(&self) -> StorageResult<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.file_error(source))
    }

    fn write_rows<I, R>(&self, rows: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator,
        R::Item: AsRef<[u8]>,
    {
        let file = self.open_for_append()?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush().map_err(|source| self.file_error(source))?;

        let file = writer
            .into_inner()
            .map_err(|e| self.file_error(e.into_error()))?;
        file.sync_data().map_err(|source| self.file_error(source))
    }

    fn file_error(&self, source: std::io::Error) -> StorageError {
        StorageError::File {
            path: self.path.clone(),
            source,
        }
    }
}

impl ResultSink for CsvResultSink {
    fn ensure_initialized(&mut self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| self.file_error(source))?;
        }

        if self.needs_header()? {
            tracing::info!("Creating result file {}", self.path.display());
            self.write_rows([CSV_HEADER])?;
        }
        Ok(())
    }

    fn append(&mut self, record: &ResultRecord) -> StorageResult<()> {
        // The file may have been removed while the crawl was running; never
        // let a row land in a headerless file.
        if self.needs_header()? {
            self.write_rows([CSV_HEADER.iter().map(|s| s.to_string()).collect(), record.to_row()])
        } else {
            self.write_rows([record.to_row()])
        }
    }
}
