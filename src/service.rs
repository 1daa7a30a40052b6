//! The exposed job posting operations.
//!
//! [`JobPostingService`] wires the pipeline together:
//!
//! ```text
//! ingest:  source document → Chunker → Embedder (batched) → ChunkStore
//! create:  query → Retriever (Embedder + ChunkStore) → prompt → Generator → ResultRecorder
//! ```
//!
//! Create paths fail strictly: every upstream error is logged and returned.
//! Delete paths follow `[service] delete_errors`. Every external call runs
//! under a [`Timeouts`] limit.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::chunk::Chunker;
use crate::config::{Config, DeleteErrorPolicy, SourceConfig};
use crate::embedding::{create_embedder, embed_all, Embedder};
use crate::error::{Error, Result};
use crate::generation::{create_generator, Generator, ModelParams};
use crate::models::{Document, EmbeddedChunk, JobPostingRecord};
use crate::prompt::{self, DEFAULT_INSTRUCTIONS};
use crate::recorder::ResultRecorder;
use crate::retriever::Retriever;
use crate::store::sqlite::SqliteStore;
use crate::store::{ChunkStore, RecordStore};
use crate::timeout::{bounded, Boundary, Timeouts};
use crate::{db, migrate, source};

/// Result of `createVectorEmbeddings`. `chunks` always equals `count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub count: usize,
    pub chunks: usize,
    pub message: String,
}

/// Result of a delete operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub success: bool,
    pub message: String,
}

/// The pluggable capabilities behind the service.
pub struct ServiceParts {
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub chunks: Arc<dyn ChunkStore>,
    pub records: Arc<dyn RecordStore>,
}

pub struct JobPostingService {
    source: SourceConfig,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    chunks: Arc<dyn ChunkStore>,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    params: ModelParams,
    instructions: String,
    recorder: ResultRecorder,
    timeouts: Timeouts,
    delete_errors: DeleteErrorPolicy,
}

impl JobPostingService {
    /// Build a service over explicit capabilities.
    pub fn new(config: &Config, parts: ServiceParts) -> Result<Self> {
        let timeouts = Timeouts::from_config(config);
        let chunker = Chunker::new(&config.chunking)?;
        let retriever = Retriever::new(
            parts.embedder.clone(),
            parts.chunks.clone(),
            config.retrieval.top_k,
        )
        .with_timeouts(timeouts);

        Ok(Self {
            source: config.source.clone(),
            chunker,
            embedder: parts.embedder,
            batch_size: config.embedding.batch_size,
            chunks: parts.chunks,
            retriever,
            generator: parts.generator,
            params: ModelParams::from_config(&config.generation),
            instructions: config
                .generation
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            recorder: ResultRecorder::new(parts.records),
            timeouts,
            delete_errors: config.service.delete_errors,
        })
    }

    /// Build the production service: SQLite storage (migrated on open) and
    /// the configured embedding and generation providers.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        let store = Arc::new(SqliteStore::new(pool, config.retrieval.metric));

        let parts = ServiceParts {
            embedder: create_embedder(&config.embedding)?,
            generator: create_generator(&config.generation)?,
            chunks: store.clone(),
            records: store,
        };
        Ok(Self::new(config, parts)?)
    }

    /// `createVectorEmbeddings`: load the configured source document, chunk
    /// it, embed the chunks and store them.
    pub async fn create_vector_embeddings(&self) -> Result<IngestReport> {
        let source = self.source.clone();
        let document = tokio::task::spawn_blocking(move || source::load_configured(&source))
            .await
            .context("source loading task panicked")
            .and_then(|loaded| loaded)
            .map_err(|e| {
                error!(path = %self.source.path.display(), error = %e, "failed to load source");
                Error::Config(format!("{:#}", e))
            })?;

        self.ingest(&document, self.source.replace_existing).await
    }

    /// Chunk, embed and store one document. With `replace`, the document's
    /// previously stored chunks are swapped for the new ones in one store
    /// call, after embedding has succeeded; a failed run leaves them in place.
    pub async fn ingest(&self, document: &Document, replace: bool) -> Result<IngestReport> {
        let source_id = document.source_id.as_str();
        let chunks = self.chunker.chunk_document(document);

        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let batches = texts.len().div_ceil(self.batch_size.max(1));
            bounded(
                Boundary::Embedding,
                self.timeouts.embedding_run(batches),
                embed_all(self.embedder.as_ref(), &texts, self.batch_size),
            )
            .await
            .inspect_err(|e| error!(source_id, error = %e, "embedding failed"))?
        };

        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
            .collect();
        let count = embedded.len();

        if replace {
            let removed = bounded(
                Boundary::Store,
                self.timeouts.store,
                self.chunks.replace_source(source_id, &embedded),
            )
            .await
            .inspect_err(|e| error!(source_id, error = %e, "replacing chunks failed"))?;
            info!(source_id, removed, "replaced existing chunks");
        } else if count > 0 {
            bounded(Boundary::Store, self.timeouts.store, self.chunks.put(&embedded))
                .await
                .inspect_err(|e| error!(source_id, error = %e, "storing chunks failed"))?;
        }

        if count == 0 {
            info!(source_id, "source produced no chunks");
            return Ok(IngestReport {
                count: 0,
                chunks: 0,
                message: "Source document is empty; nothing was stored".to_string(),
            });
        }

        info!(source_id, count, "stored embedded chunks");
        Ok(IngestReport {
            count,
            chunks: count,
            message: format!("Stored {} embedded chunks from {}", count, source_id),
        })
    }

    /// `createJobPosting`: generate a grounded posting for `user_query` and
    /// record it. Missing or blank input fails before any external call.
    pub async fn create_job_posting(&self, user_query: Option<&str>) -> Result<JobPostingRecord> {
        let query = match user_query {
            Some(q) if !q.trim().is_empty() => q,
            _ => {
                return Err(Error::Validation(
                    "user_query is required and must not be blank".to_string(),
                ))
            }
        };

        let retrieval = self
            .retriever
            .retrieve_default(query)
            .await
            .inspect_err(|e| error!(error = %e, "retrieval failed"))?;
        if retrieval.top_chunks.is_empty() {
            warn!("no grounding chunks stored; generating without context");
        }

        let payload = prompt::assemble(&self.instructions, &retrieval.top_chunks, query);
        let completion = bounded(
            Boundary::Generation,
            self.timeouts.generation,
            self.generator.complete(&payload, &self.params),
        )
        .await
        .inspect_err(|e| error!(code = e.code(), error = %e, "generation failed"))?;
        if !completion.safety_flags.is_empty() {
            warn!(flags = ?completion.safety_flags, "completion carries safety annotations");
        }

        bounded(
            Boundary::Store,
            self.timeouts.store,
            self.recorder.record(query, &completion.text),
        )
        .await
        .inspect_err(|e| error!(error = %e, "recording job posting failed"))
    }

    /// `listJobPostings`: stored records, newest first.
    pub async fn list_job_postings(&self) -> Result<Vec<JobPostingRecord>> {
        bounded(Boundary::Store, self.timeouts.store, self.recorder.list()).await
    }

    /// `deleteJobPosting`: an unknown id still succeeds. A blank id is a
    /// validation error regardless of the delete policy.
    pub async fn delete_job_posting(&self, id: &str) -> Result<DeleteOutcome> {
        if id.trim().is_empty() {
            return Err(Error::Validation("id is required".to_string()));
        }
        let result = bounded(
            Boundary::Store,
            self.timeouts.store,
            self.recorder.delete_by_id(id),
        )
        .await
        .map(|removed| {
            if removed {
                format!("Job posting {} deleted", id)
            } else {
                format!("No job posting with id {}; nothing to delete", id)
            }
        });
        self.settle("deleteJobPosting", result)
    }

    /// `deleteJobPostings`: remove every record.
    pub async fn delete_job_postings(&self) -> Result<DeleteOutcome> {
        let result = bounded(Boundary::Store, self.timeouts.store, self.recorder.delete_all())
            .await
            .map(|removed| format!("Deleted {} job postings", removed));
        self.settle("deleteJobPostings", result)
    }

    /// `deleteVectorEmbeddings`: remove every stored chunk.
    pub async fn delete_vector_embeddings(&self) -> Result<DeleteOutcome> {
        let result = bounded(Boundary::Store, self.timeouts.store, self.chunks.delete_all())
            .await
            .map(|removed| format!("Deleted {} embedded chunks", removed));
        if let Ok(message) = &result {
            info!(%message, "cleared chunk store");
        }
        self.settle("deleteVectorEmbeddings", result)
    }

    /// Number of stored chunks.
    pub async fn chunk_count(&self) -> Result<u64> {
        bounded(Boundary::Store, self.timeouts.store, self.chunks.count()).await
    }

    fn settle(&self, operation: &str, result: Result<String>) -> Result<DeleteOutcome> {
        match result {
            Ok(message) => Ok(DeleteOutcome {
                success: true,
                message,
            }),
            Err(err) => match self.delete_errors {
                DeleteErrorPolicy::Swallow => {
                    warn!(
                        operation,
                        code = err.code(),
                        error = %err,
                        "delete failed; reporting success"
                    );
                    Ok(DeleteOutcome {
                        success: true,
                        message: format!("{} finished", operation),
                    })
                }
                DeleteErrorPolicy::Propagate => {
                    error!(operation, error = %err, "delete failed");
                    Err(err)
                }
            },
        }
    }
}
