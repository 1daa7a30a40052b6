#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use jobpost_rag::config::{self, Config};
use jobpost_rag::embedding::Embedder;
use jobpost_rag::error::{Error, Result};
use jobpost_rag::generation::{Completion, Generator, ModelParams};
use jobpost_rag::models::{EmbeddedChunk, JobPostingRecord, SimilarityResult};
use jobpost_rag::prompt::PromptPayload;
use jobpost_rag::service::{JobPostingService, ServiceParts};
use jobpost_rag::store::memory::InMemoryStore;
use jobpost_rag::store::{ChunkStore, RecordStore};

pub const GROUNDING: &str = "Acme Corp is headquartered in Berlin.\n\n\
Salary bands: engineers earn 80k to 110k EUR. The salary is reviewed yearly.\n\n\
Benefits: 30 vacation days, a benefit budget for learning, and a pension plan.\n\n\
Remote work is possible two days per week; remote equipment is provided.";

/// Parse a config rooted at `root`, with `extra` TOML appended.
pub fn config(root: &Path, extra: &str) -> Config {
    let text = format!(
        "[db]\npath = \"{}\"\n\n[source]\npath = \"{}\"\n\n{}",
        root.join("data").join("jobpost.sqlite").display(),
        root.join("grounding.txt").display(),
        extra
    );
    let cfg: Config = toml::from_str(&text).unwrap();
    config::validate(&cfg).unwrap();
    cfg
}

/// Three-dimensional embedding counting topic words.
pub struct KeywordEmbedder;

const TOPICS: [&str; 3] = ["salary", "benefit", "remote"];

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keywords"
    }

    fn dims(&self) -> usize {
        TOPICS.len()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                TOPICS
                    .iter()
                    .map(|w| lower.matches(w).count() as f32 + 0.01)
                    .collect()
            })
            .collect())
    }
}

/// Behaves like [`KeywordEmbedder`] for its first `ok_calls` batches, then
/// fails every call.
pub struct ExhaustedEmbedder {
    ok_calls: usize,
    calls: AtomicUsize,
}

impl ExhaustedEmbedder {
    pub fn new(ok_calls: usize) -> Self {
        Self {
            ok_calls,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for ExhaustedEmbedder {
    fn model_name(&self) -> &str {
        "exhausted"
    }

    fn dims(&self) -> usize {
        TOPICS.len()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_calls {
            return Err(Error::Embedding("quota exceeded".to_string()));
        }
        KeywordEmbedder.embed_batch(texts).await
    }
}

/// Writes a posting that echoes the query and remembers the last prompt.
#[derive(Default)]
pub struct EchoGenerator {
    pub last_prompt: Mutex<Option<PromptPayload>>,
}

#[async_trait]
impl Generator for EchoGenerator {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, prompt: &PromptPayload, _params: &ModelParams) -> Result<Completion> {
        let query = prompt
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        *self.last_prompt.lock().unwrap() = Some(prompt.clone());
        Ok(Completion {
            text: format!("We are hiring: {}", query),
            safety_flags: Vec::new(),
        })
    }
}

/// Rejects every prompt as a policy violation.
pub struct RejectingGenerator;

#[async_trait]
impl Generator for RejectingGenerator {
    fn model_name(&self) -> &str {
        "rejecting"
    }

    async fn complete(&self, _prompt: &PromptPayload, _params: &ModelParams) -> Result<Completion> {
        Err(Error::ContentPolicy("prompt rejected by hate filter".to_string()))
    }
}

/// Never answers within any reasonable time limit.
pub struct StalledGenerator;

#[async_trait]
impl Generator for StalledGenerator {
    fn model_name(&self) -> &str {
        "stalled"
    }

    async fn complete(&self, _prompt: &PromptPayload, _params: &ModelParams) -> Result<Completion> {
        tokio::time::sleep(Duration::from_secs(120)).await;
        Err(Error::Generation("unreachable".to_string()))
    }
}

/// A store whose every operation fails.
pub struct BrokenStore;

fn broken<T>() -> Result<T> {
    Err(Error::Store("database is locked".to_string()))
}

#[async_trait]
impl ChunkStore for BrokenStore {
    async fn put(&self, _chunks: &[EmbeddedChunk]) -> Result<()> {
        broken()
    }
    async fn nearest(&self, _query: &[f32], _k: usize) -> Result<Vec<SimilarityResult>> {
        broken()
    }
    async fn delete_all(&self) -> Result<u64> {
        broken()
    }
    async fn delete_by_source(&self, _source_id: &str) -> Result<u64> {
        broken()
    }
    async fn replace_source(&self, _source_id: &str, _chunks: &[EmbeddedChunk]) -> Result<u64> {
        broken()
    }
    async fn count(&self) -> Result<u64> {
        broken()
    }
}

#[async_trait]
impl RecordStore for BrokenStore {
    async fn insert(&self, _user_query: &str, _generated_text: &str) -> Result<JobPostingRecord> {
        broken()
    }
    async fn get(&self, _id: &str) -> Result<Option<JobPostingRecord>> {
        broken()
    }
    async fn list(&self) -> Result<Vec<JobPostingRecord>> {
        broken()
    }
    async fn delete_by_id(&self, _id: &str) -> Result<bool> {
        broken()
    }
    async fn delete_all(&self) -> Result<u64> {
        broken()
    }
}

/// Service over an in-memory store and the keyword embedder.
pub fn memory_service(
    cfg: &Config,
    generator: Arc<dyn Generator>,
) -> (JobPostingService, Arc<InMemoryStore>) {
    memory_service_with(cfg, Arc::new(KeywordEmbedder), generator)
}

/// Service over an in-memory store and the given embedder.
pub fn memory_service_with(
    cfg: &Config,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
) -> (JobPostingService, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new(cfg.retrieval.metric));
    let service = JobPostingService::new(
        cfg,
        ServiceParts {
            embedder,
            generator,
            chunks: store.clone(),
            records: store.clone(),
        },
    )
    .unwrap();
    (service, store)
}

/// Service whose stores always fail.
pub fn broken_service(cfg: &Config) -> JobPostingService {
    let store = Arc::new(BrokenStore);
    JobPostingService::new(
        cfg,
        ServiceParts {
            embedder: Arc::new(KeywordEmbedder),
            generator: Arc::new(EchoGenerator::default()),
            chunks: store.clone(),
            records: store,
        },
    )
    .unwrap()
}
