//! Storage abstraction for chunks and generated postings.
//!
//! The [`ChunkStore`] trait covers embedded-chunk persistence and
//! nearest-neighbour ranking; [`RecordStore`] covers job posting records.
//! Both are implemented by [`memory::InMemoryStore`] and
//! [`sqlite::SqliteStore`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::config::Metric;
use crate::embedding::similarity;
use crate::error::{Error, Result};
use crate::models::{Chunk, EmbeddedChunk, JobPostingRecord, SimilarityResult};

/// Persisted embedded chunks with similarity ranking.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put`](ChunkStore::put) | Append embedded chunks (no deduplication) |
/// | [`nearest`](ChunkStore::nearest) | Top-k chunks by similarity to a query vector |
/// | [`delete_all`](ChunkStore::delete_all) | Remove every chunk |
/// | [`delete_by_source`](ChunkStore::delete_by_source) | Remove the chunks of one source |
/// | [`replace_source`](ChunkStore::replace_source) | Atomically swap one source's chunks |
/// | [`count`](ChunkStore::count) | Number of stored chunks |
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Append rows. Every vector must share the dimensionality of the
    /// vectors already stored.
    async fn put(&self, chunks: &[EmbeddedChunk]) -> Result<()>;

    /// Return `min(k, count)` results sorted by non-increasing score, ties
    /// in insertion order. An empty store yields an empty result.
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<SimilarityResult>>;

    /// Remove every chunk, returning how many were removed.
    async fn delete_all(&self) -> Result<u64>;

    /// Remove the chunks of `source_id`, returning how many were removed.
    async fn delete_by_source(&self, source_id: &str) -> Result<u64>;

    /// Remove the chunks of `source_id` and append `chunks` as one unit.
    /// The dimensionality check runs against what remains after removal.
    /// On error nothing changes. Returns how many chunks were removed.
    async fn replace_source(&self, source_id: &str, chunks: &[EmbeddedChunk]) -> Result<u64>;

    async fn count(&self) -> Result<u64>;
}

/// Persisted job posting records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record, assigning its id and creation time.
    async fn insert(&self, user_query: &str, generated_text: &str) -> Result<JobPostingRecord>;

    async fn get(&self, id: &str) -> Result<Option<JobPostingRecord>>;

    /// All records, newest first.
    async fn list(&self) -> Result<Vec<JobPostingRecord>>;

    /// Remove one record. Returns `false` when no record had that id.
    async fn delete_by_id(&self, id: &str) -> Result<bool>;

    /// Remove every record, returning how many were removed.
    async fn delete_all(&self) -> Result<u64>;
}

/// Verify that a batch is internally consistent and matches `existing`
/// (the dimensionality already in the store, if any).
pub(crate) fn check_put_dims(existing: Option<usize>, chunks: &[EmbeddedChunk]) -> Result<()> {
    let Some(first) = chunks.first() else {
        return Ok(());
    };
    let expected = existing.unwrap_or(first.dims());
    if let Some(bad) = chunks.iter().find(|c| c.dims() != expected) {
        return Err(Error::DimensionMismatch {
            expected,
            actual: bad.dims(),
        });
    }
    Ok(())
}

/// Score `rows` (in insertion order) against `query` and keep the top `k`.
///
/// The sort is stable, so equal scores keep insertion order.
pub(crate) fn rank<I>(
    metric: Metric,
    query: &[f32],
    rows: I,
    k: usize,
) -> Result<Vec<SimilarityResult>>
where
    I: IntoIterator<Item = (Chunk, Vec<f32>)>,
{
    let mut results = Vec::new();
    for (chunk, vector) in rows {
        if vector.len() != query.len() {
            return Err(Error::DimensionMismatch {
                expected: vector.len(),
                actual: query.len(),
            });
        }
        let score = similarity(metric, query, &vector);
        results.push(SimilarityResult { chunk, score });
    }

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(k);
    Ok(results)
}
