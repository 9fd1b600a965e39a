//! Storage abstraction for docshelf.
//!
//! A database is two independent stores joined by document id:
//!
//! - [`RelationalStore`]: authoritative record of document identity,
//!   text, metadata, and the advisory cluster cache.
//! - [`VectorIndex`]: one embedding per live document, nearest-neighbour
//!   query by cosine distance.
//!
//! Neither trait offers a transaction spanning both. Keeping them in step
//! is the orchestrator's job; see `docshelf::document_store`.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Document;

/// One stored embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Document id this vector belongs to.
    pub id: String,
    pub vector: Vec<f32>,
    /// Hash of the canonical text the vector was computed from.
    pub content_hash: String,
    pub model: String,
}

/// A nearest-neighbour hit: document id and cosine distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub distance: f32,
}

/// Cluster cache entry written back onto a document row.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    pub document_id: String,
    pub cluster_id: i64,
    pub cluster_name: String,
}

/// Relational half of a database.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](RelationalStore::insert) | Insert a new row (fails on duplicate id) |
/// | [`replace`](RelationalStore::replace) | Overwrite an existing row by id |
/// | [`get`](RelationalStore::get) | Fetch one row |
/// | [`delete`](RelationalStore::delete) | Remove one row |
/// | [`list`](RelationalStore::list) | All rows, newest `created_at` first |
/// | [`content_hashes`](RelationalStore::content_hashes) | `(id, content_hash)` pairs for reconcile |
/// | [`set_cluster_assignments`](RelationalStore::set_cluster_assignments) | Rewrite the cluster cache |
#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn insert(&self, doc: &Document) -> Result<()>;

    /// Returns `false` when no row has `doc.id`.
    async fn replace(&self, doc: &Document) -> Result<bool>;

    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Returns `false` when no row had `id`.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Every row ordered by `created_at` descending, then id ascending.
    async fn list(&self) -> Result<Vec<Document>>;

    async fn content_hashes(&self) -> Result<Vec<(String, String)>>;

    async fn count(&self) -> Result<u64>;

    /// Remove every row, returning how many were removed.
    async fn clear(&self) -> Result<u64>;

    /// Null out `cluster_id`/`cluster_name` on every row, then set the
    /// given assignments.
    async fn set_cluster_assignments(&self, assignments: &[ClusterAssignment]) -> Result<()>;

    /// Null out `cluster_id`/`cluster_name` on every row.
    async fn clear_cluster_assignments(&self) -> Result<()>;

    /// Release any open handles. Later calls may fail.
    async fn close(&self) {}
}

/// Vector half of a database.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite the vector for `record.id`.
    async fn upsert(&self, record: &VectorRecord) -> Result<()>;

    /// Returns `false` when no vector had `id`.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// The `k` nearest vectors by ascending cosine distance, ties by id.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorMatch>>;

    /// Full snapshot of every stored vector.
    async fn all(&self) -> Result<Vec<VectorRecord>>;

    async fn content_hashes(&self) -> Result<Vec<(String, String)>>;

    async fn count(&self) -> Result<u64>;

    /// Drop every vector.
    async fn delete_collection(&self) -> Result<()>;

    /// Release any open handles. Later calls may fail.
    async fn close(&self) {}
}

/// Sort vector matches the way every index must return them.
pub fn sort_matches(matches: &mut [VectorMatch]) {
    matches.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Order documents the way [`RelationalStore::list`] must return them.
pub fn sort_newest_first(docs: &mut [Document]) {
    docs.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
