//! Crawler module for walking a Slack workspace
//!
//! This module contains the core crawling logic, including:
//! - Cursor and page-number pagination over Slack collections
//! - A bounded worker pool with caller-runs backpressure
//! - Turning messages and files into index records
//! - Overall crawl coordination

mod coordinator;
mod paginator;
mod pool;
mod record;

pub use coordinator::Coordinator;
pub use paginator::{PageOutcome, PageToken, Paginated, Paginator};
pub use pool::{ShutdownReport, WorkerPool};
pub use record::{
    attachment_text, synthesize_permalink, ts_to_millis, IndexRecord, RecordBuilder, RecordKind,
};

use crate::config::Config;
use crate::output::CrawlSummary;
use crate::storage::{open_storage, RunStatus};
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Runs a complete crawl into the configured SQLite database
///
/// This is the main entry point for the command-line crawler. It will:
/// 1. Open (or create) the database
/// 2. Record a new crawl run with the config hash
/// 3. Run the coordinator with the database as record sink and failure store
/// 4. Mark the run completed or failed
///
/// # Arguments
///
/// * `config` - The validated crawler configuration
/// * `config_hash` - SHA-256 of the config file, stored on the run row
///
/// # Example
///
/// ```no_run
/// use slack_harvest::config::load_config_with_hash;
/// use slack_harvest::crawler::crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let summary = crawl(config, &hash).await?;
/// println!("{} records indexed", summary.indexed);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: Config, config_hash: &str) -> Result<CrawlSummary> {
    let storage = Arc::new(open_storage(Path::new(&config.output.database_path))?);
    let run_id = storage.create_run(config_hash)?;
    tracing::info!("Starting crawl run {}", run_id);

    let coordinator = Coordinator::new(config, storage.clone(), storage.clone())?;
    let result = coordinator.run().await;

    let status = if result.is_ok() {
        RunStatus::Completed
    } else {
        RunStatus::Failed
    };
    storage.complete_run(run_id, status)?;

    result
}
