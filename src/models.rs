//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, chunks, similarity results and
//! generated job postings that flow through ingestion and generation.

use serde::{Deserialize, Serialize};

/// Raw source text plus the identifier it was loaded under.
#[derive(Debug, Clone)]
pub struct Document {
    pub source_id: String,
    pub text: String,
}

impl Document {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

/// A bounded segment of a document.
///
/// `start_offset` is the character (not byte) offset of the segment within
/// the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub text: String,
    pub source_id: String,
    pub start_offset: usize,
}

/// A chunk together with its embedding vector.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn dims(&self) -> usize {
        self.vector.len()
    }
}

/// A stored chunk ranked against a query vector. Higher score = more similar.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// A persisted (query, generated posting) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPostingRecord {
    pub id: String,
    pub user_query: String,
    pub generated_text: String,
    pub created_at: String,
}
