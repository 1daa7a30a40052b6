//! In-memory store for tests and ephemeral runs.
//!
//! Uses `Vec`s behind `std::sync::RwLock`; vector search is brute-force
//! over every stored vector.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::Metric;
use crate::error::{Error, Result};
use crate::models::{EmbeddedChunk, JobPostingRecord, SimilarityResult};

use super::{check_put_dims, rank, ChunkStore, RecordStore};

/// In-memory implementation of both [`ChunkStore`] and [`RecordStore`].
pub struct InMemoryStore {
    metric: Metric,
    chunks: RwLock<Vec<EmbeddedChunk>>,
    records: RwLock<Vec<JobPostingRecord>>,
}

impl InMemoryStore {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            chunks: RwLock::new(Vec::new()),
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Metric::Cosine)
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| Error::Store("in-memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| Error::Store("in-memory store lock poisoned".to_string()))
}

#[async_trait]
impl ChunkStore for InMemoryStore {
    async fn put(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        let mut stored = write(&self.chunks)?;
        check_put_dims(stored.first().map(|c| c.dims()), chunks)?;
        stored.extend_from_slice(chunks);
        Ok(())
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<SimilarityResult>> {
        let stored = read(&self.chunks)?;
        rank(
            self.metric,
            query,
            stored.iter().map(|c| (c.chunk.clone(), c.vector.clone())),
            k,
        )
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut stored = write(&self.chunks)?;
        let removed = stored.len() as u64;
        stored.clear();
        Ok(removed)
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<u64> {
        let mut stored = write(&self.chunks)?;
        let before = stored.len();
        stored.retain(|c| c.chunk.source_id != source_id);
        Ok((before - stored.len()) as u64)
    }

    async fn replace_source(&self, source_id: &str, chunks: &[EmbeddedChunk]) -> Result<u64> {
        let mut stored = write(&self.chunks)?;
        let kept: Vec<EmbeddedChunk> = stored
            .iter()
            .filter(|c| c.chunk.source_id != source_id)
            .cloned()
            .collect();
        check_put_dims(kept.first().map(|c| c.dims()), chunks)?;

        let removed = (stored.len() - kept.len()) as u64;
        *stored = kept;
        stored.extend_from_slice(chunks);
        Ok(removed)
    }

    async fn count(&self) -> Result<u64> {
        Ok(read(&self.chunks)?.len() as u64)
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert(&self, user_query: &str, generated_text: &str) -> Result<JobPostingRecord> {
        let record = JobPostingRecord {
            id: Uuid::new_v4().to_string(),
            user_query: user_query.to_string(),
            generated_text: generated_text.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        write(&self.records)?.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<JobPostingRecord>> {
        Ok(read(&self.records)?.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<JobPostingRecord>> {
        Ok(read(&self.records)?.iter().rev().cloned().collect())
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let mut records = write(&self.records)?;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut records = write(&self.records)?;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn embedded(source: &str, offset: usize, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk {
                text: format!("{}@{}", source, offset),
                source_id: source.to_string(),
                start_offset: offset,
            },
            vector,
        }
    }

    #[tokio::test]
    async fn test_nearest_on_empty_store() {
        let store = InMemoryStore::default();
        assert!(store.nearest(&[1.0, 0.0], 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nearest_sorted_and_bounded() {
        let store = InMemoryStore::default();
        store
            .put(&[
                embedded("a", 0, vec![0.0, 1.0]),
                embedded("a", 10, vec![1.0, 0.0]),
                embedded("a", 20, vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let results = store.nearest(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.start_offset, 10);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(store.nearest(&[1.0, 0.0], 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_rejects_other_dims() {
        let store = InMemoryStore::default();
        store.put(&[embedded("a", 0, vec![1.0, 0.0])]).await.unwrap();
        let err = store
            .put(&[embedded("a", 5, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
        assert!(store.nearest(&[1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_put_appends_duplicates() {
        let store = InMemoryStore::default();
        let rows = [embedded("a", 0, vec![1.0, 0.0])];
        store.put(&rows).await.unwrap();
        store.put(&rows).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_by_source_removes_only_that_source() {
        let store = InMemoryStore::default();
        store
            .put(&[
                embedded("keep", 0, vec![1.0, 0.0]),
                embedded("drop", 0, vec![1.0, 0.0]),
                embedded("drop", 9, vec![0.9, 0.1]),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_by_source("drop").await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
        let results = store.nearest(&[1.0, 0.0], 3).await.unwrap();
        assert!(results.iter().all(|r| r.chunk.source_id == "keep"));
    }

    #[tokio::test]
    async fn test_replace_source_swaps_only_that_source() {
        let store = InMemoryStore::default();
        store
            .put(&[
                embedded("keep", 0, vec![1.0, 0.0]),
                embedded("swap", 0, vec![1.0, 0.0]),
                embedded("swap", 9, vec![0.9, 0.1]),
            ])
            .await
            .unwrap();

        let removed = store
            .replace_source("swap", &[embedded("swap", 4, vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count().await.unwrap(), 2);
        let results = store.nearest(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].chunk.text, "swap@4");
    }

    #[tokio::test]
    async fn test_replace_source_leaves_store_untouched_on_mismatch() {
        let store = InMemoryStore::default();
        store
            .put(&[
                embedded("keep", 0, vec![1.0, 0.0]),
                embedded("swap", 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let err = store
            .replace_source("swap", &[embedded("swap", 0, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_records_lifecycle() {
        let store = InMemoryStore::default();
        let first = store.insert("q1", "posting one").await.unwrap();
        let second = store.insert("q2", "posting two").await.unwrap();
        assert_ne!(first.id, second.id);

        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].id, second.id);

        assert!(store.delete_by_id(&first.id).await.unwrap());
        assert!(!store.delete_by_id(&first.id).await.unwrap());
        assert!(store.get(&first.id).await.unwrap().is_none());
        assert_eq!(RecordStore::delete_all(&store).await.unwrap(), 1);
    }
}
