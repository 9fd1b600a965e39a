//! SQLite-backed [`RelationalStore`] and [`VectorIndex`].
//!
//! Each database directory holds two files, `documents.sqlite` and
//! `vectors.sqlite`, with their own pools. There is no transaction that
//! spans both; the orchestrator keeps them in step.
//!
//! Timestamps are stored as unix milliseconds. Vector query is
//! brute-force cosine distance over every stored embedding.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

use docshelf_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use docshelf_core::models::Document;
use docshelf_core::store::{
    sort_matches, ClusterAssignment, RelationalStore, VectorIndex, VectorMatch, VectorRecord,
};

use crate::db;
use crate::migrate;

pub const DOCUMENTS_FILE: &str = "documents.sqlite";
pub const VECTORS_FILE: &str = "vectors.sqlite";

const DOCUMENT_COLUMNS: &str = "id, title, content, doc_type, tags, source, authors, \
     content_hash, created_at, updated_at, cluster_id, cluster_name";

fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn row_to_document(row: &SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        doc_type: row.get("doc_type"),
        tags: row.get("tags"),
        source: row.get("source"),
        authors: row.get("authors"),
        content_hash: row.get("content_hash"),
        created_at: from_millis(row.get("created_at")),
        updated_at: from_millis(row.get("updated_at")),
        cluster_id: row.get("cluster_id"),
        cluster_name: row.get("cluster_name"),
    }
}

/// SQLite implementation of the [`RelationalStore`] trait.
pub struct SqliteRelationalStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteRelationalStore {
    /// Open `<dir>/documents.sqlite`, creating and migrating it if needed.
    pub async fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(DOCUMENTS_FILE);
        let pool = db::connect(&path).await?;
        migrate::run_document_migrations(&pool).await?;
        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RelationalStore for SqliteRelationalStore {
    async fn insert(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, title, content, doc_type, tags, source, authors,
                                   content_hash, created_at, updated_at, cluster_id, cluster_name)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(&doc.doc_type)
        .bind(&doc.tags)
        .bind(&doc.source)
        .bind(&doc.authors)
        .bind(&doc.content_hash)
        .bind(to_millis(&doc.created_at))
        .bind(to_millis(&doc.updated_at))
        .bind(doc.cluster_id)
        .bind(&doc.cluster_name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace(&self, doc: &Document) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE documents SET
                title = ?, content = ?, doc_type = ?, tags = ?, source = ?, authors = ?,
                content_hash = ?, created_at = ?, updated_at = ?,
                cluster_id = ?, cluster_name = ?
            WHERE id = ?
            "#,
        )
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(&doc.doc_type)
        .bind(&doc.tags)
        .bind(&doc.source)
        .bind(&doc.authors)
        .bind(&doc.content_hash)
        .bind(to_millis(&doc.created_at))
        .bind(to_millis(&doc.updated_at))
        .bind(doc.cluster_id)
        .bind(&doc.cluster_name)
        .bind(&doc.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_document))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn content_hashes(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT id, content_hash FROM documents")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| (r.get("id"), r.get("content_hash")))
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM documents")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn set_cluster_assignments(&self, assignments: &[ClusterAssignment]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE documents SET cluster_id = NULL, cluster_name = NULL")
            .execute(&mut *tx)
            .await?;

        for a in assignments {
            sqlx::query("UPDATE documents SET cluster_id = ?, cluster_name = ? WHERE id = ?")
                .bind(a.cluster_id)
                .bind(&a.cluster_name)
                .bind(&a.document_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear_cluster_assignments(&self) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET cluster_id = NULL, cluster_name = NULL WHERE cluster_id IS NOT NULL",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// SQLite implementation of the [`VectorIndex`] trait.
pub struct SqliteVectorIndex {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteVectorIndex {
    /// Open `<dir>/vectors.sqlite`, creating and migrating it if needed.
    pub async fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(VECTORS_FILE);
        let pool = db::connect(&path).await?;
        migrate::run_vector_migrations(&pool).await?;
        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(&self, record: &VectorRecord) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let blob = vec_to_blob(&record.vector);

        sqlx::query(
            r#"
            INSERT INTO vectors (id, embedding, dims, model, content_hash, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                embedding = excluded.embedding,
                dims = excluded.dims,
                model = excluded.model,
                content_hash = excluded.content_hash,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&blob)
        .bind(record.vector.len() as i64)
        .bind(&record.model)
        .bind(&record.content_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vectors WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
        let rows = sqlx::query("SELECT id, embedding FROM vectors")
            .fetch_all(&self.pool)
            .await?;

        let mut matches: Vec<VectorMatch> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                VectorMatch {
                    id: row.get("id"),
                    distance: cosine_distance(vector, &blob_to_vec(&blob)),
                }
            })
            .collect();

        sort_matches(&mut matches);
        matches.truncate(k);
        Ok(matches)
    }

    async fn all(&self) -> Result<Vec<VectorRecord>> {
        let rows = sqlx::query("SELECT id, embedding, model, content_hash FROM vectors ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                VectorRecord {
                    id: row.get("id"),
                    vector: blob_to_vec(&blob),
                    content_hash: row.get("content_hash"),
                    model: row.get("model"),
                }
            })
            .collect())
    }

    async fn content_hashes(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT id, content_hash FROM vectors")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| (r.get("id"), r.get("content_hash")))
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }

    async fn delete_collection(&self) -> Result<()> {
        sqlx::query("DELETE FROM vectors").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshelf_core::models::NewDocument;

    #[tokio::test]
    async fn test_relational_roundtrip_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRelationalStore::open(dir.path()).await.unwrap();

        let doc = Document::from_new(
            NewDocument::new("Title", "Body")
                .with_doc_type("note")
                .with_tags("a, b")
                .with_authors("Ada"),
        );
        store.insert(&doc).await.unwrap();

        let loaded = store.get(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Title");
        assert_eq!(loaded.tags.as_deref(), Some("a, b"));
        assert_eq!(loaded.content_hash, doc.content_hash);
        assert_eq!(
            loaded.created_at.timestamp_millis(),
            doc.created_at.timestamp_millis()
        );
        assert!(store.insert(&doc).await.is_err());
    }

    #[tokio::test]
    async fn test_list_newest_first_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRelationalStore::open(dir.path()).await.unwrap();

        let mut old = Document::from_new(NewDocument::new("Old", "o"));
        old.created_at = from_millis(1_000);
        let mut new = Document::from_new(NewDocument::new("New", "n"));
        new.created_at = from_millis(2_000);
        store.insert(&old).await.unwrap();
        store.insert(&new).await.unwrap();

        let titles: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.title)
            .collect();
        assert_eq!(titles, vec!["New", "Old"]);

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cluster_assignments() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRelationalStore::open(dir.path()).await.unwrap();
        let doc = Document::from_new(NewDocument::new("T", "C"));
        store.insert(&doc).await.unwrap();

        store
            .set_cluster_assignments(&[ClusterAssignment {
                document_id: doc.id.clone(),
                cluster_id: 3,
                cluster_name: "Three".into(),
            }])
            .await
            .unwrap();
        let loaded = store.get(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.cluster_id, Some(3));

        store.clear_cluster_assignments().await.unwrap();
        let loaded = store.get(&doc.id).await.unwrap().unwrap();
        assert!(loaded.cluster_id.is_none());
        assert!(loaded.cluster_name.is_none());
    }

    #[tokio::test]
    async fn test_vector_upsert_query_delete() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteVectorIndex::open(dir.path()).await.unwrap();

        for (id, v) in [("x", vec![1.0, 0.0]), ("y", vec![0.0, 1.0])] {
            index
                .upsert(&VectorRecord {
                    id: id.into(),
                    vector: v,
                    content_hash: "h".into(),
                    model: "m".into(),
                })
                .await
                .unwrap();
        }

        let hits = index.query(&[0.9, 0.1], 5).await.unwrap();
        assert_eq!(hits[0].id, "x");
        assert_eq!(hits.len(), 2);

        assert!(index.delete("x").await.unwrap());
        assert!(!index.delete("x").await.unwrap());
        assert_eq!(index.count().await.unwrap(), 1);
        assert_eq!(index.all().await.unwrap()[0].vector, vec![0.0, 1.0]);

        index.delete_collection().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
    }
}
