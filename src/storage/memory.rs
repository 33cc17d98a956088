//! In-memory storage
//!
//! Holds records and failures in vectors. Used when embedding the crawler
//! in a host that indexes records itself, and in tests.

use crate::crawler::IndexRecord;
use crate::storage::traits::{FailureRecord, FailureStore, RecordSink, StorageResult};
use crate::HarvestError;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<Vec<IndexRecord>>,
    failures: Mutex<Vec<FailureRecord>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored record, in arrival order
    pub fn records(&self) -> Vec<IndexRecord> {
        lock(&self.records).clone()
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        lock(&self.failures).clone()
    }
}

impl RecordSink for MemoryStorage {
    fn store(&self, record: &IndexRecord) -> StorageResult<()> {
        lock(&self.records).push(record.clone());
        Ok(())
    }
}

impl FailureStore for MemoryStorage {
    fn record_failure(
        &self,
        url: &str,
        classification: &str,
        error: &HarvestError,
    ) -> StorageResult<()> {
        lock(&self.failures).push(FailureRecord::from_error(url, classification, error));
        Ok(())
    }
}
