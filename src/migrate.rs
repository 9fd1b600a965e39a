//! Idempotent schema setup, run every time a database is opened.

use anyhow::Result;
use sqlx::SqlitePool;

/// Relational store schema: one row per document plus the cluster cache.
pub async fn run_document_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            doc_type TEXT,
            tags TEXT,
            source TEXT,
            authors TEXT,
            content_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            cluster_id INTEGER,
            cluster_name TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Vector index schema: one embedding per document id.
pub async fn run_vector_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            model TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
