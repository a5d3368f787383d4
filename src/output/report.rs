//! Offline report over an existing result file
//!
//! Backs the `--stats` mode: reads the CSV and the progress ledger and
//! summarises what has been collected so far without touching the network.

use crate::storage::{ProgressLedger, StorageError, StorageResult};
use crate::MarketId;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

/// Summary of a result file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputStatistics {
    /// Data rows (header excluded)
    pub rows: u64,

    /// Distinct market identifiers among the rows
    pub distinct_ids: u64,

    /// Identifiers that occur in more than one row, ascending
    pub duplicate_ids: Vec<MarketId>,

    /// Rows with a non-empty business name
    pub rows_with_business_name: u64,

    /// Rows whose identifier cell is not a number or that fail to parse
    pub unreadable_rows: u64,

    /// Checkpoint from the progress ledger, if any
    pub last_id: Option<MarketId>,
}

/// Reads the result file and the ledger
///
/// A missing result file is reported as zero rows.
pub fn load_output_statistics(
    csv_path: &Path,
    ledger: &dyn ProgressLedger,
) -> StorageResult<OutputStatistics> {
    let mut stats = OutputStatistics {
        last_id: ledger.load().map(|record| record.last_id),
        ..OutputStatistics::default()
    };

    if !csv_path.exists() {
        return Ok(stats);
    }

    let file = File::open(csv_path).map_err(|source| StorageError::File {
        path: csv_path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut seen = HashSet::new();
    let mut duplicates = HashSet::new();

    for result in reader.records() {
        stats.rows += 1;

        let record = match result {
            Ok(record) => record,
            Err(_) => {
                stats.unreadable_rows += 1;
                continue;
            }
        };

        let id = match record.get(0).and_then(|cell| cell.trim().parse::<MarketId>().ok()) {
            Some(id) => id,
            None => {
                stats.unreadable_rows += 1;
                continue;
            }
        };

        if !seen.insert(id) {
            duplicates.insert(id);
        }

        if record.get(1).is_some_and(|name| !name.trim().is_empty()) {
            stats.rows_with_business_name += 1;
        }
    }

    stats.distinct_ids = seen.len() as u64;
    let mut duplicate_ids: Vec<MarketId> = duplicates.into_iter().collect();
    duplicate_ids.sort_unstable();
    stats.duplicate_ids = duplicate_ids;

    Ok(stats)
}

/// Prints the report to stdout
pub fn print_output_statistics(stats: &OutputStatistics) {
    println!("=== Output Statistics ===\n");
    println!("  Rows:                   {}", stats.rows);
    println!("  Distinct markets:       {}", stats.distinct_ids);
    println!("  Rows with business name: {}", stats.rows_with_business_name);
    if stats.unreadable_rows > 0 {
        println!("  Unreadable rows:        {}", stats.unreadable_rows);
    }
    match stats.last_id {
        Some(id) => println!("  Last handled market:    {}", id),
        None => println!("  Last handled market:    (no progress recorded)"),
    }

    if !stats.duplicate_ids.is_empty() {
        println!("\nDuplicate markets ({}):", stats.duplicate_ids.len());
        for id in &stats.duplicate_ids {
            println!("  - {}", id);
        }
    }
}
