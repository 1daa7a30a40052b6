//! SQLite-backed [`ChunkStore`] and [`RecordStore`].
//!
//! Vectors are stored as little-endian blobs in `document_chunks`; ranking
//! loads every row in insertion order and scores it in process.

use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::config::Metric;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::Result;
use crate::models::{Chunk, EmbeddedChunk, JobPostingRecord, SimilarityResult};

use super::{check_put_dims, rank, ChunkStore, RecordStore};

pub struct SqliteStore {
    pool: SqlitePool,
    metric: Metric,
}

impl SqliteStore {
    /// Wrap a pool whose schema has already been migrated.
    pub fn new(pool: SqlitePool, metric: Metric) -> Self {
        Self { pool, metric }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<JobPostingRecord> {
    Ok(JobPostingRecord {
        id: row.try_get("id")?,
        user_query: row.try_get("user_query")?,
        generated_text: row.try_get("generated_text")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Check dims against the rows visible in `tx`, then insert `chunks`.
async fn insert_chunks(tx: &mut Transaction<'_, Sqlite>, chunks: &[EmbeddedChunk]) -> Result<()> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT dims FROM document_chunks LIMIT 1")
        .fetch_optional(&mut **tx)
        .await?;
    check_put_dims(existing.map(|d| d as usize), chunks)?;

    for embedded in chunks {
        sqlx::query(
            r#"
            INSERT INTO document_chunks (id, source_id, start_offset, text, dims, embedding)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&embedded.chunk.source_id)
        .bind(embedded.chunk.start_offset as i64)
        .bind(&embedded.chunk.text)
        .bind(embedded.dims() as i64)
        .bind(vec_to_blob(&embedded.vector))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn put(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_chunks(&mut tx, chunks).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<SimilarityResult>> {
        let rows = sqlx::query(
            "SELECT source_id, start_offset, text, embedding FROM document_chunks ORDER BY rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut decoded = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            let start_offset: i64 = row.try_get("start_offset")?;
            let chunk = Chunk {
                text: row.try_get("text")?,
                source_id: row.try_get("source_id")?,
                start_offset: start_offset as usize,
            };
            decoded.push((chunk, blob_to_vec(&blob)?));
        }

        rank(self.metric, query, decoded, k)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM document_chunks")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM document_chunks WHERE source_id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn replace_source(&self, source_id: &str, chunks: &[EmbeddedChunk]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM document_chunks WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        insert_chunks(&mut tx, chunks).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert(&self, user_query: &str, generated_text: &str) -> Result<JobPostingRecord> {
        let record = JobPostingRecord {
            id: Uuid::new_v4().to_string(),
            user_query: user_query.to_string(),
            generated_text: generated_text.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO job_postings (id, user_query, generated_text, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.user_query)
        .bind(&record.generated_text)
        .bind(&record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<JobPostingRecord>> {
        let row = sqlx::query(
            "SELECT id, user_query, generated_text, created_at FROM job_postings WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<JobPostingRecord>> {
        let rows = sqlx::query(
            "SELECT id, user_query, generated_text, created_at FROM job_postings ORDER BY rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM job_postings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM job_postings")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
