//! Persistence of generated job postings.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::models::JobPostingRecord;
use crate::store::RecordStore;

/// Records (query, generated text) pairs in a [`RecordStore`].
pub struct ResultRecorder {
    store: Arc<dyn RecordStore>,
}

impl ResultRecorder {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Persist one posting. Every call produces a new record.
    pub async fn record(&self, user_query: &str, generated_text: &str) -> Result<JobPostingRecord> {
        let record = self.store.insert(user_query, generated_text).await?;
        info!(id = %record.id, "recorded job posting");
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<Option<JobPostingRecord>> {
        self.store.get(id).await
    }

    /// All records, newest first.
    pub async fn list(&self) -> Result<Vec<JobPostingRecord>> {
        self.store.list().await
    }

    /// Delete one record. An unknown id is not an error.
    pub async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let removed = self.store.delete_by_id(id).await?;
        if !removed {
            warn!(id, "no job posting with this id");
        }
        Ok(removed)
    }

    pub async fn delete_all(&self) -> Result<u64> {
        let removed = self.store.delete_all().await?;
        info!(removed, "deleted all job postings");
        Ok(removed)
    }
}
