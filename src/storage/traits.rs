//! Storage traits and error types
//!
//! The crawler writes to two seams: a `RecordSink` that receives finished
//! records for indexing and a `FailureStore` that receives items that could
//! not be processed. Both are called from worker tasks concurrently.

use crate::crawler::IndexRecord;
use crate::HarvestError;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Receives every record the crawler builds
pub trait RecordSink: Send + Sync {
    fn store(&self, record: &IndexRecord) -> StorageResult<()>;
}

/// Receives every item that failed
pub trait FailureStore: Send + Sync {
    /// Records a failure
    ///
    /// # Arguments
    ///
    /// * `url` - Permalink of the item, or a `slack://` locator when none is known
    /// * `classification` - Stable error label, see `HarvestError::classification`
    /// * `error` - The error itself
    fn record_failure(
        &self,
        url: &str,
        classification: &str,
        error: &HarvestError,
    ) -> StorageResult<()>;
}

/// A stored failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub url: String,
    pub classification: String,
    pub message: String,
    pub root_cause: String,
}

impl FailureRecord {
    pub fn from_error(url: &str, classification: &str, error: &HarvestError) -> Self {
        Self {
            url: url.to_string(),
            classification: classification.to_string(),
            message: error.to_string(),
            root_cause: error.root_cause(),
        }
    }
}
