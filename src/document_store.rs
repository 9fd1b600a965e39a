//! Document Store: keeps a relational store and a vector index in step.
//!
//! Every live document row has exactly one vector under the same id, and
//! every vector has a row. Neither backend offers a transaction spanning
//! both, so writes follow one pattern:
//!
//! 1. compute the embedding before touching either store,
//! 2. write the relational row,
//! 3. write the vector,
//! 4. on vector failure, undo the row.
//!
//! Anything that still slips through (a failed undo, a vector delete that
//! errors after the row is gone, an orphan seen during search) is logged
//! and pushed onto the fault queue. [`DocumentStore::reconcile`] drains
//! the queue by treating the relational store as ground truth.
//!
//! # Concurrency
//!
//! Writes to one document id hold that id's mutex across both stores.
//! Whole-store operations (`clear_all`, `reconcile`, `reembed_all`) take
//! the write side of a store-wide gate; per-document writes take the read
//! side. Reads take no locks.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use docshelf_core::cluster::{ClusterEngine, ClusterInput, ClusterParams, ClusterResult};
use docshelf_core::embedding::EmbeddingProvider;
use docshelf_core::models::{now_millis, Document, DocumentPatch, NewDocument};
use docshelf_core::search::{hydrate, rank, SearchHit};
use docshelf_core::store::{RelationalStore, VectorIndex, VectorRecord};
use docshelf_core::{ShelfError, ShelfResult};

use crate::db;
use crate::sqlite_store::{SqliteRelationalStore, SqliteVectorIndex, DOCUMENTS_FILE, VECTORS_FILE};

/// What kind of drift a queued fault records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Vector with no relational row.
    OrphanVector,
    /// Relational row with no vector.
    MissingVector,
    /// Vector computed from text the row no longer has.
    StaleVector,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    pub document_id: String,
    pub kind: FaultKind,
}

/// Counts of repairs made by one [`DocumentStore::reconcile`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub orphan_vectors_removed: usize,
    pub missing_vectors_embedded: usize,
    pub stale_vectors_refreshed: usize,
    /// Ids whose repair failed; they stay queued.
    pub unresolved: Vec<String>,
}

impl ReconcileReport {
    pub fn total_repairs(&self) -> usize {
        self.orphan_vectors_removed + self.missing_vectors_embedded + self.stale_vectors_refreshed
    }
}

/// Outcome of [`DocumentStore::reembed_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReembedReport {
    pub embedded: usize,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub database_id: String,
    pub document_count: u64,
    pub vector_count: u64,
    pub dims: usize,
    pub model: String,
    pub pending_faults: usize,
    pub database_size_bytes: u64,
}

pub struct DocumentStore {
    database_id: String,
    relational: Arc<dyn RelationalStore>,
    vectors: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    engine: ClusterEngine,
    batch_size: usize,
    location: Option<PathBuf>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    gate: RwLock<()>,
    faults: parking_lot::Mutex<BTreeMap<String, FaultKind>>,
}

impl DocumentStore {
    pub fn new(
        database_id: impl Into<String>,
        relational: Arc<dyn RelationalStore>,
        vectors: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            database_id: database_id.into(),
            relational,
            vectors,
            embedder,
            engine: ClusterEngine::default(),
            batch_size: 64,
            location: None,
            locks: DashMap::new(),
            gate: RwLock::new(()),
            faults: parking_lot::Mutex::new(BTreeMap::new()),
        }
    }

    /// Open the SQLite pair under `dir` (`documents.sqlite` + `vectors.sqlite`).
    pub async fn open_sqlite(
        database_id: impl Into<String>,
        dir: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let relational = SqliteRelationalStore::open(dir).await?;
        let vectors = SqliteVectorIndex::open(dir).await?;
        Ok(Self::new(database_id, Arc::new(relational), Arc::new(vectors), embedder)
            .with_location(dir))
    }

    pub fn with_cluster_engine(mut self, engine: ClusterEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_location(mut self, dir: &Path) -> Self {
        self.location = Some(dir.to_path_buf());
        self
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Close both backends. Any later call on this store fails.
    pub async fn close(&self) {
        self.relational.close().await;
        self.vectors.close().await;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Writes
    // ═══════════════════════════════════════════════════════════════════════

    /// Validate, embed, and persist a new document.
    pub async fn add(&self, new: NewDocument) -> ShelfResult<Document> {
        validate_text("title", &new.title)?;
        validate_text("content", &new.content)?;
        let doc = self.insert_document(Document::from_new(new)).await?;
        info!(db = %self.database_id, id = %doc.id, "added document");
        Ok(doc)
    }

    /// Embed and write a fully formed document (row first, then vector).
    async fn insert_document(&self, doc: Document) -> ShelfResult<Document> {
        let vector = self.embed_text(&doc.canonical_text()).await?;

        let _gate = self.gate.read().await;
        let guard = self.lock_document(&doc.id).await;
        let written = self.write_new(&doc, vector).await;
        drop(guard);
        self.release_lock(&doc.id);
        written?;

        self.invalidate_clusters().await;
        Ok(doc)
    }

    async fn write_new(&self, doc: &Document, vector: Vec<f32>) -> ShelfResult<()> {
        self.relational
            .insert(doc)
            .await
            .map_err(ShelfError::Storage)?;

        if let Err(e) = self.vectors.upsert(&self.record_for(doc, vector)).await {
            warn!(db = %self.database_id, id = %doc.id, error = %e, "vector write failed, rolling back row");
            if let Err(rollback) = self.relational.delete(&doc.id).await {
                warn!(id = %doc.id, error = %rollback, "row rollback failed");
                self.queue_fault(&doc.id, FaultKind::MissingVector);
            }
            return Err(ShelfError::provider(format!("vector index: {e}")));
        }
        Ok(())
    }

    /// Apply `patch` to an existing document. Re-embeds only when the title
    /// or content changes; the row's cluster cache is cleared either way.
    pub async fn update(&self, id: &str, patch: DocumentPatch) -> ShelfResult<Document> {
        if let Some(title) = &patch.title {
            validate_text("title", title)?;
        }
        if let Some(content) = &patch.content {
            validate_text("content", content)?;
        }

        let _gate = self.gate.read().await;
        let guard = self.lock_document(id).await;
        let updated = self.write_patch(id, patch).await;
        drop(guard);
        self.release_lock(id);
        updated
    }

    async fn write_patch(&self, id: &str, patch: DocumentPatch) -> ShelfResult<Document> {
        let current = self
            .relational
            .get(id)
            .await
            .map_err(ShelfError::Storage)?
            .ok_or_else(|| ShelfError::document_not_found(id))?;

        let (mut next, text_changed) = patch.apply(&current);
        next.updated_at = now_millis();
        next.cluster_id = None;
        next.cluster_name = None;

        let vector = if text_changed {
            Some(self.embed_text(&next.canonical_text()).await?)
        } else {
            None
        };

        if !self
            .relational
            .replace(&next)
            .await
            .map_err(ShelfError::Storage)?
        {
            return Err(ShelfError::document_not_found(id));
        }

        if let Some(vector) = vector {
            if let Err(e) = self.vectors.upsert(&self.record_for(&next, vector)).await {
                warn!(db = %self.database_id, id, error = %e, "vector write failed, restoring row");
                if let Err(restore) = self.relational.replace(&current).await {
                    warn!(id, error = %restore, "row restore failed");
                    self.queue_fault(id, FaultKind::StaleVector);
                }
                return Err(ShelfError::provider(format!("vector index: {e}")));
            }
        }

        info!(db = %self.database_id, id, reembedded = text_changed, "updated document");
        Ok(next)
    }

    pub async fn rename(&self, id: &str, title: &str) -> ShelfResult<Document> {
        self.update(
            id,
            DocumentPatch {
                title: Some(title.to_string()),
                ..DocumentPatch::default()
            },
        )
        .await
    }

    /// Remove a document's row and vector.
    ///
    /// A vector delete that fails after the row is gone leaves an orphan;
    /// it is queued for reconcile and the call still succeeds.
    pub async fn delete(&self, id: &str) -> ShelfResult<()> {
        let _gate = self.gate.read().await;
        let guard = self.lock_document(id).await;
        let removed = self.remove_document(id).await;
        drop(guard);
        self.release_lock(id);
        removed?;

        info!(db = %self.database_id, id, "deleted document");
        Ok(())
    }

    async fn remove_document(&self, id: &str) -> ShelfResult<()> {
        if !self
            .relational
            .delete(id)
            .await
            .map_err(ShelfError::Storage)?
        {
            return Err(ShelfError::document_not_found(id));
        }
        self.remove_vector_after_row(id).await;
        self.invalidate_clusters().await;
        Ok(())
    }

    /// Delete every document and vector, returning how many documents were
    /// removed.
    pub async fn clear_all(&self) -> ShelfResult<u64> {
        let _gate = self.gate.write().await;

        let ids: Vec<String> = self
            .relational
            .content_hashes()
            .await
            .map_err(ShelfError::Storage)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        self.vectors
            .delete_collection()
            .await
            .map_err(|e| ShelfError::provider(format!("vector index: {e}")))?;

        let removed = match self.relational.clear().await {
            Ok(n) => n,
            Err(e) => {
                warn!(db = %self.database_id, error = %e, "row clear failed after vectors were dropped");
                for id in &ids {
                    self.queue_fault(id, FaultKind::MissingVector);
                }
                return Err(ShelfError::Storage(e));
            }
        };

        self.faults.lock().clear();
        self.locks.clear();
        info!(db = %self.database_id, removed, "cleared database");
        Ok(removed)
    }

    /// Copy a document into `target` (re-embedded there, new id, original
    /// `created_at`), then remove it here.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` when `target` is this database.
    /// - Any error from the target insert; this database is untouched.
    /// - `PartialMove` when the copy exists but the source row could not
    ///   be removed.
    pub async fn move_to(&self, id: &str, target: &DocumentStore) -> ShelfResult<Document> {
        if target.database_id == self.database_id {
            return Err(ShelfError::InvalidArgument(
                "cannot move a document into the database it is already in".into(),
            ));
        }

        let _gate = self.gate.read().await;
        let guard = self.lock_document(id).await;
        let moved = self.copy_then_remove(id, target).await;
        drop(guard);
        self.release_lock(id);
        let copy = moved?;

        info!(
            source_db = %self.database_id,
            target_db = %target.database_id,
            id,
            new_id = %copy.id,
            "moved document"
        );
        Ok(copy)
    }

    async fn copy_then_remove(&self, id: &str, target: &DocumentStore) -> ShelfResult<Document> {
        let source = self
            .relational
            .get(id)
            .await
            .map_err(ShelfError::Storage)?
            .ok_or_else(|| ShelfError::document_not_found(id))?;

        let mut copy = Document::from_new(source.to_new());
        copy.created_at = source.created_at;
        let copy = target.insert_document(copy).await?;

        if let Err(e) = self.relational.delete(id).await {
            warn!(
                source_db = %self.database_id,
                target_db = %target.database_id,
                id,
                new_id = %copy.id,
                error = %e,
                "move left the source document in place"
            );
            return Err(ShelfError::PartialMove {
                source_id: id.to_string(),
                new_id: copy.id,
                reason: e.to_string(),
            });
        }
        self.remove_vector_after_row(id).await;
        self.invalidate_clusters().await;
        Ok(copy)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Reads
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn get(&self, id: &str) -> ShelfResult<Document> {
        self.relational
            .get(id)
            .await
            .map_err(ShelfError::Storage)?
            .ok_or_else(|| ShelfError::document_not_found(id))
    }

    /// 1-based position in ascending `created_at` order.
    pub async fn get_by_index(&self, index: usize) -> ShelfResult<Document> {
        if index == 0 {
            return Err(ShelfError::InvalidArgument(
                "document index is 1-based".into(),
            ));
        }
        let mut docs = self.list().await?;
        docs.reverse();
        docs.into_iter()
            .nth(index - 1)
            .ok_or_else(|| ShelfError::document_not_found(format!("#{index}")))
    }

    /// Every document, newest first.
    pub async fn list(&self) -> ShelfResult<Vec<Document>> {
        self.relational.list().await.map_err(ShelfError::Storage)
    }

    pub async fn count(&self) -> ShelfResult<u64> {
        self.relational.count().await.map_err(ShelfError::Storage)
    }

    /// Up to `limit` documents nearest to `query`, best first.
    ///
    /// Vectors without a row are skipped, logged, and queued; the index is
    /// asked once more for enough extra candidates to cover them.
    pub async fn search(&self, query: &str, limit: usize) -> ShelfResult<Vec<SearchHit>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embed_text(query).await?;
        let mut hydrated = self.query_and_hydrate(&vector, limit).await?;

        if !hydrated.orphans.is_empty() {
            for orphan in &hydrated.orphans {
                warn!(db = %self.database_id, id = %orphan, "search hit has no document row");
                self.queue_fault(orphan, FaultKind::OrphanVector);
            }
            let widened = limit + hydrated.orphans.len();
            hydrated = self.query_and_hydrate(&vector, widened).await?;
            for orphan in &hydrated.orphans {
                self.queue_fault(orphan, FaultKind::OrphanVector);
            }
        }

        Ok(rank(hydrated.hits, limit))
    }

    async fn query_and_hydrate(
        &self,
        vector: &[f32],
        k: usize,
    ) -> ShelfResult<docshelf_core::search::Hydrated> {
        let matches = self
            .vectors
            .query(vector, k)
            .await
            .map_err(|e| ShelfError::provider(format!("vector index: {e}")))?;
        hydrate(self.relational.as_ref(), &matches)
            .await
            .map_err(ShelfError::Storage)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Repair
    // ═══════════════════════════════════════════════════════════════════════

    /// Queued faults not yet repaired.
    pub fn pending_faults(&self) -> Vec<Fault> {
        self.faults
            .lock()
            .iter()
            .map(|(id, kind)| Fault {
                document_id: id.clone(),
                kind: *kind,
            })
            .collect()
    }

    /// Bring the vector index back in line with the relational store.
    ///
    /// Orphan vectors are deleted; rows without a vector, or whose vector
    /// was computed from other text, are re-embedded. Idempotent: a second
    /// pass with no intervening writes repairs nothing.
    pub async fn reconcile(&self) -> ShelfResult<ReconcileReport> {
        let _gate = self.gate.write().await;

        let rows: HashMap<String, String> = self
            .relational
            .content_hashes()
            .await
            .map_err(ShelfError::Storage)?
            .into_iter()
            .collect();
        let vectors: HashMap<String, String> = self
            .vectors
            .content_hashes()
            .await
            .map_err(|e| ShelfError::provider(format!("vector index: {e}")))?
            .into_iter()
            .collect();

        let mut report = ReconcileReport::default();
        let mut unresolved: BTreeMap<String, FaultKind> = BTreeMap::new();

        let mut orphans: Vec<&String> = vectors.keys().filter(|id| !rows.contains_key(*id)).collect();
        orphans.sort();
        for id in orphans {
            match self.vectors.delete(id).await {
                Ok(_) => report.orphan_vectors_removed += 1,
                Err(e) => {
                    warn!(id = %id, error = %e, "could not remove orphan vector");
                    unresolved.insert(id.clone(), FaultKind::OrphanVector);
                }
            }
        }

        let mut to_embed: Vec<(&String, FaultKind)> = rows
            .iter()
            .filter_map(|(id, hash)| match vectors.get(id) {
                None => Some((id, FaultKind::MissingVector)),
                Some(v) if v != hash => Some((id, FaultKind::StaleVector)),
                Some(_) => None,
            })
            .collect();
        to_embed.sort_by(|a, b| a.0.cmp(b.0));

        for (id, kind) in to_embed {
            match self.repair_vector(id).await {
                Ok(()) => match kind {
                    FaultKind::MissingVector => report.missing_vectors_embedded += 1,
                    _ => report.stale_vectors_refreshed += 1,
                },
                Err(e) => {
                    warn!(id = %id, error = %e, "could not repair vector");
                    unresolved.insert(id.clone(), kind);
                }
            }
        }

        report.unresolved = unresolved.keys().cloned().collect();
        *self.faults.lock() = unresolved;

        if report.total_repairs() > 0 {
            self.invalidate_clusters().await;
            info!(
                db = %self.database_id,
                orphans = report.orphan_vectors_removed,
                missing = report.missing_vectors_embedded,
                stale = report.stale_vectors_refreshed,
                unresolved = report.unresolved.len(),
                "reconciled stores"
            );
        }
        Ok(report)
    }

    async fn repair_vector(&self, id: &str) -> Result<()> {
        let doc = self
            .relational
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("row {id} disappeared during reconcile"))?;
        let vector = self.embedder.embed_one(&doc.canonical_text()).await?;
        self.vectors.upsert(&self.record_for(&doc, vector)).await
    }

    /// Recompute every vector from the current rows, for example after
    /// switching embedding models. Failures are queued as stale.
    pub async fn reembed_all(&self) -> ShelfResult<ReembedReport> {
        let _gate = self.gate.write().await;
        let docs = self.list().await?;
        let mut report = ReembedReport::default();

        for batch in docs.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|d| d.canonical_text()).collect();
            let vectors = match self.embedder.embed(&texts).await {
                Ok(v) if v.len() == batch.len() => v,
                Ok(_) | Err(_) => {
                    warn!(db = %self.database_id, size = batch.len(), "embedding batch failed");
                    for doc in batch {
                        self.queue_fault(&doc.id, FaultKind::StaleVector);
                        report.failed.push(doc.id.clone());
                    }
                    continue;
                }
            };

            for (doc, vector) in batch.iter().zip(vectors) {
                let written = match docshelf_core::embedding::check_dims(&vector, self.embedder.dims()) {
                    Ok(()) => self.vectors.upsert(&self.record_for(doc, vector)).await,
                    Err(e) => Err(e),
                };
                match written {
                    Ok(()) => report.embedded += 1,
                    Err(e) => {
                        warn!(id = %doc.id, error = %e, "re-embed failed");
                        self.queue_fault(&doc.id, FaultKind::StaleVector);
                        report.failed.push(doc.id.clone());
                    }
                }
            }
        }

        self.invalidate_clusters().await;
        info!(db = %self.database_id, embedded = report.embedded, failed = report.failed.len(), "re-embedded documents");
        Ok(report)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Clustering
    // ═══════════════════════════════════════════════════════════════════════

    /// Cluster every live document and write the result back as the
    /// advisory cache.
    ///
    /// Runs [`reconcile`](Self::reconcile) first whenever faults are queued
    /// or the two stores disagree, and refuses to cluster if that leaves
    /// anything unresolved. The result is a snapshot as of `snapshot_at`.
    pub async fn cluster(&self, params: ClusterParams) -> ShelfResult<ClusterResult> {
        params.validate()?;

        let has_faults = !self.faults.lock().is_empty();
        if has_faults || self.stores_disagree().await? {
            debug!(db = %self.database_id, "stores out of step, reconciling before clustering");
            let report = self.reconcile().await?;
            if !report.unresolved.is_empty() {
                return Err(ShelfError::provider(format!(
                    "{} consistency faults could not be repaired; run reconcile once the embedding provider is reachable",
                    report.unresolved.len()
                )));
            }
        }

        let docs = self.list().await?;
        let mut vectors: HashMap<String, Vec<f32>> = self
            .vectors
            .all()
            .await
            .map_err(|e| ShelfError::provider(format!("vector index: {e}")))?
            .into_iter()
            .map(|r| (r.id, r.vector))
            .collect();

        let inputs: Vec<ClusterInput> = docs
            .into_iter()
            .filter_map(|document| {
                let vector = vectors.remove(&document.id)?;
                Some(ClusterInput { document, vector })
            })
            .collect();

        let result = self.engine.run(&params, &inputs)?;

        if let Err(e) = self
            .relational
            .set_cluster_assignments(&result.assignments())
            .await
        {
            warn!(db = %self.database_id, error = %e, "could not write cluster cache");
        }

        info!(
            db = %self.database_id,
            clusters = result.num_clusters,
            documents = result.total_documents,
            index = %result.validity_index,
            score = ?result.validity_score,
            "clustered documents"
        );
        Ok(result)
    }

    async fn stores_disagree(&self) -> ShelfResult<bool> {
        let rows: HashSet<(String, String)> = self
            .relational
            .content_hashes()
            .await
            .map_err(ShelfError::Storage)?
            .into_iter()
            .collect();
        let vectors: HashSet<(String, String)> = self
            .vectors
            .content_hashes()
            .await
            .map_err(|e| ShelfError::provider(format!("vector index: {e}")))?
            .into_iter()
            .collect();
        Ok(rows != vectors)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Stats
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn stats(&self) -> ShelfResult<StoreStats> {
        let document_count = self.count().await?;
        let vector_count = self
            .vectors
            .count()
            .await
            .map_err(|e| ShelfError::provider(format!("vector index: {e}")))?;
        let database_size_bytes = self
            .location
            .as_ref()
            .map(|dir| db::file_size(&dir.join(DOCUMENTS_FILE)) + db::file_size(&dir.join(VECTORS_FILE)))
            .unwrap_or(0);

        Ok(StoreStats {
            database_id: self.database_id.clone(),
            document_count,
            vector_count,
            dims: self.embedder.dims(),
            model: self.embedder.model_name().to_string(),
            pending_faults: self.faults.lock().len(),
            database_size_bytes,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════════════════

    async fn embed_text(&self, text: &str) -> ShelfResult<Vec<f32>> {
        self.embedder
            .embed_one(text)
            .await
            .map_err(ShelfError::provider)
    }

    fn record_for(&self, doc: &Document, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: doc.id.clone(),
            vector,
            content_hash: doc.content_hash.clone(),
            model: self.embedder.model_name().to_string(),
        }
    }

    async fn remove_vector_after_row(&self, id: &str) {
        match self.vectors.delete(id).await {
            Ok(true) => {}
            Ok(false) => debug!(db = %self.database_id, id, "document had no vector"),
            Err(e) => {
                warn!(db = %self.database_id, id, error = %e, "vector delete failed, queued for reconcile");
                self.queue_fault(id, FaultKind::OrphanVector);
            }
        }
    }

    async fn invalidate_clusters(&self) {
        if let Err(e) = self.relational.clear_cluster_assignments().await {
            warn!(db = %self.database_id, error = %e, "could not clear cluster cache");
        }
    }

    fn queue_fault(&self, id: &str, kind: FaultKind) {
        let fault = ShelfError::ConsistencyFault(format!("{kind:?} for {id}"));
        warn!(db = %self.database_id, "{fault}");
        self.faults.lock().insert(id.to_string(), kind);
    }

    async fn lock_document(&self, id: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drop the per-id mutex once nobody else is waiting on it.
    fn release_lock(&self, id: &str) {
        self.locks.remove_if(id, |_, m| Arc::strong_count(m) == 1);
    }
}

fn validate_text(field: &str, value: &str) -> ShelfResult<()> {
    if value.trim().is_empty() {
        return Err(ShelfError::InvalidArgument(format!("{field} must not be empty")));
    }
    Ok(())
}
