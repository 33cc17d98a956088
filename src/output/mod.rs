//! Output module for crawl summaries and reports
//!
//! This module handles:
//! - Counting discovered, indexed, skipped and failed items during a run
//! - Printing the end-of-run summary
//! - Loading and printing database statistics for `--stats`

pub mod stats;

pub use stats::{
    load_statistics, print_statistics, print_summary, CrawlStats, CrawlSummary,
    StorageStatistics,
};
