use anyhow::Result;
use sqlx::SqlitePool;

/// Create the chunk and job posting tables. Safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Insertion order is the implicit rowid; ranking ties and listings rely on it.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_chunks (
            id TEXT NOT NULL UNIQUE,
            source_id TEXT NOT NULL,
            start_offset INTEGER NOT NULL,
            text TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_postings (
            id TEXT NOT NULL UNIQUE,
            user_query TEXT NOT NULL,
            generated_text TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_document_chunks_source_id ON document_chunks(source_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
