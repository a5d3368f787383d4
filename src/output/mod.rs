//! Output module for run reporting
//!
//! This module handles:
//! - Per-identifier progress lines and periodic summaries during a crawl
//! - The end-of-run summary
//! - The offline `--stats` report over an existing result file

pub mod report;
pub mod stats;

pub use report::{load_output_statistics, print_output_statistics, OutputStatistics};
pub use stats::{format_elapsed, print_run_summary, RunStatistics};
