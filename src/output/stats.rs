//! Crawl statistics
//!
//! `CrawlStats` counts what happens during a run and is shared by worker
//! tasks; `CrawlSummary` is its snapshot once the run is over. The
//! `--stats` report is built from the database instead.

use crate::cache::CacheStatsSnapshot;
use crate::storage::{RunRecord, SqliteStorage, StorageResult};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters for one crawl run
#[derive(Debug, Default)]
pub struct CrawlStats {
    channels: AtomicU64,
    messages: AtomicU64,
    replies: AtomicU64,
    files: AtomicU64,
    indexed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

impl CrawlStats {
    pub fn channel_crawled(&self) {
        self.channels.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_discovered(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reply_discovered(&self) {
        self.replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_discovered(&self) {
        self.files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_indexed(&self) {
        self.indexed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A failed item whose processing panicked; also counted by `item_failed`
    pub fn item_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshots the counters into a summary
    ///
    /// `pool_panics` are panics the worker pool caught outside any item
    /// handler.
    pub fn summary(
        &self,
        inline_runs: u64,
        pool_panics: u64,
        aborted_workers: usize,
        cache: CacheStatsSnapshot,
        elapsed: Duration,
    ) -> CrawlSummary {
        CrawlSummary {
            channels: self.channels.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            replies: self.replies.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
            indexed: self.indexed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed) + pool_panics,
            inline_runs,
            aborted_workers,
            cache,
            elapsed,
        }
    }
}

/// Outcome of a finished crawl run
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSummary {
    pub channels: u64,
    pub messages: u64,
    pub replies: u64,
    pub files: u64,
    pub indexed: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Items whose processing panicked
    pub panicked: u64,
    /// Items run by the paginating task because the worker queue was full
    pub inline_runs: u64,
    /// Workers still busy when the shutdown grace period ran out
    pub aborted_workers: usize,
    pub cache: CacheStatsSnapshot,
    pub elapsed: Duration,
}

impl CrawlSummary {
    pub fn discovered(&self) -> u64 {
        self.messages + self.replies + self.files
    }
}

/// Prints a run summary to stdout
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Discovered:");
    println!("  Channels: {}", summary.channels);
    println!("  Messages: {}", summary.messages);
    println!("  Replies: {}", summary.replies);
    println!("  Files: {}", summary.files);
    println!();

    println!("Results:");
    println!("  Indexed: {}", summary.indexed);
    println!("  Skipped: {}", summary.skipped);
    println!("  Failed: {}", summary.failed);
    if summary.panicked > 0 {
        println!("  Panicked: {}", summary.panicked);
    }
    println!();

    println!("Entity cache:");
    println!(
        "  Hits: {}  Misses: {}  API calls: {}  API errors: {}",
        summary.cache.hits, summary.cache.misses, summary.cache.api_calls, summary.cache.api_errors
    );
    println!();

    if summary.inline_runs > 0 {
        println!("Items run inline (queue full): {}", summary.inline_runs);
    }
    if summary.aborted_workers > 0 {
        println!(
            "Workers aborted after grace period: {}",
            summary.aborted_workers
        );
    }
    println!("Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
}

/// Statistics loaded from the database
#[derive(Debug, Clone)]
pub struct StorageStatistics {
    pub total_records: u64,
    pub records_by_kind: BTreeMap<String, u64>,
    pub records_by_channel: BTreeMap<String, u64>,
    pub failures_by_classification: BTreeMap<String, u64>,
    pub latest_run: Option<RunRecord>,
}

impl StorageStatistics {
    pub fn total_failures(&self) -> u64 {
        self.failures_by_classification.values().sum()
    }
}

/// Loads statistics from storage
pub fn load_statistics(storage: &SqliteStorage) -> StorageResult<StorageStatistics> {
    Ok(StorageStatistics {
        total_records: storage.count_records()?,
        records_by_kind: storage.count_records_by_kind()?,
        records_by_channel: storage.count_records_by_channel()?,
        failures_by_classification: storage.count_failures_by_classification()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StorageStatistics) {
    println!("=== Harvest Statistics ===\n");

    if let Some(run) = &stats.latest_run {
        println!("Latest run:");
        println!("  #{} started {}", run.id, run.started_at);
        println!("  Status: {}", run.status.to_db_string());
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!();
    }

    println!("Records: {}", stats.total_records);
    for (kind, count) in &stats.records_by_kind {
        println!("  {}: {}", kind, count);
    }
    println!();

    if !stats.records_by_channel.is_empty() {
        println!("Records by Channel:");
        let mut channel_counts: Vec<_> = stats.records_by_channel.iter().collect();
        channel_counts.sort_by(|a, b| b.1.cmp(a.1));
        for (channel, count) in channel_counts {
            println!("  #{}: {}", channel, count);
        }
        println!();
    }

    if !stats.failures_by_classification.is_empty() {
        println!("Failures ({}):", stats.total_failures());
        let mut failure_counts: Vec<_> = stats.failures_by_classification.iter().collect();
        failure_counts.sort_by(|a, b| b.1.cmp(a.1));
        for (classification, count) in failure_counts {
            println!("  {}: {}", classification, count);
        }
        println!();
    }

    let attempted = stats.total_records + stats.total_failures();
    let success_rate = if attempted > 0 {
        (stats.total_records as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Success Rate: {:.1}% ({} / {} items indexed)",
        success_rate, stats.total_records, attempted
    );
}
