//! Query-side retrieval: embed the query, then rank stored chunks.
//!
//! An empty store is not an error. The caller gets no chunks and proceeds
//! with an ungrounded prompt.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::models::SimilarityResult;
use crate::store::ChunkStore;
use crate::timeout::{bounded, Boundary, Timeouts};

/// Chunks retrieved for one query.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub query: String,
    pub top_chunks: Vec<SimilarityResult>,
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn ChunkStore>,
    top_k: usize,
    timeouts: Timeouts,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn ChunkStore>, top_k: usize) -> Self {
        Self {
            embedder,
            store,
            top_k,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Retrieve with the configured `k`.
    pub async fn retrieve_default(&self, query: &str) -> Result<Retrieval> {
        self.retrieve(query, self.top_k).await
    }

    /// Embed `query` and return up to `k` chunks ranked by similarity.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Retrieval> {
        if query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".to_string()));
        }

        let vector = bounded(
            Boundary::Embedding,
            self.timeouts.embedding,
            self.embedder.embed(query),
        )
        .await?;
        let top_chunks =
            bounded(Boundary::Store, self.timeouts.store, self.store.nearest(&vector, k)).await?;
        debug!(k, found = top_chunks.len(), "retrieved chunks");

        Ok(Retrieval {
            query: query.to_string(),
            top_chunks,
        })
    }
}
