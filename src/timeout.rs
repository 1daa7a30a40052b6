//! Time limits for calls that leave the process.
//!
//! Every embedding, generation and store call made by the service runs
//! under one of these limits; expiry becomes the error kind of the
//! boundary that hung.

use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};

/// Ceiling for the limit of a whole multi-batch embedding run.
const MAX_RUN_LIMIT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub embedding: Duration,
    pub generation: Duration,
    pub store: Duration,
}

impl Timeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            embedding: Duration::from_secs(config.embedding.timeout_secs),
            generation: Duration::from_secs(config.generation.timeout_secs),
            store: Duration::from_secs(config.service.store_timeout_secs),
        }
    }

    /// Limit for embedding `batches` batches back to back: the per-call
    /// limit times the batch count, saturating at one day.
    pub fn embedding_run(&self, batches: usize) -> Duration {
        let batches = u32::try_from(batches.max(1)).unwrap_or(u32::MAX);
        self.embedding.saturating_mul(batches).min(MAX_RUN_LIMIT)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            embedding: Duration::from_secs(30),
            generation: Duration::from_secs(60),
            store: Duration::from_secs(10),
        }
    }
}

/// Which boundary a bounded call crosses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Embedding,
    Generation,
    Store,
}

impl Boundary {
    fn elapsed(self, limit: Duration) -> Error {
        let msg = format!("timed out after {:?}", limit);
        match self {
            Boundary::Embedding => Error::Embedding(msg),
            Boundary::Generation => Error::Generation(msg),
            Boundary::Store => Error::Store(msg),
        }
    }
}

/// Await `fut` for at most `limit`.
pub async fn bounded<T, F>(boundary: Boundary, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(boundary.elapsed(limit)),
    }
}
