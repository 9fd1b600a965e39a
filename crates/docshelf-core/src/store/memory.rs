//! In-memory store implementations for tests and embedded use.
//!
//! Both stores keep their data in a `HashMap` behind a `parking_lot::RwLock`.
//! Vector query is brute-force cosine distance over all stored vectors.

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::embedding::cosine_distance;
use crate::models::Document;

use super::{
    sort_matches, sort_newest_first, ClusterAssignment, RelationalStore, VectorIndex,
    VectorMatch, VectorRecord,
};

/// In-memory relational store.
#[derive(Default)]
pub struct InMemoryRelationalStore {
    docs: RwLock<HashMap<String, Document>>,
}

impl InMemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationalStore for InMemoryRelationalStore {
    async fn insert(&self, doc: &Document) -> Result<()> {
        let mut docs = self.docs.write();
        if docs.contains_key(&doc.id) {
            bail!("duplicate document id: {}", doc.id);
        }
        docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn replace(&self, doc: &Document) -> Result<bool> {
        let mut docs = self.docs.write();
        match docs.get_mut(&doc.id) {
            Some(slot) => {
                *slot = doc.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.docs.read().get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.docs.write().remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self.docs.read().values().cloned().collect();
        sort_newest_first(&mut docs);
        Ok(docs)
    }

    async fn content_hashes(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .docs
            .read()
            .values()
            .map(|d| (d.id.clone(), d.content_hash.clone()))
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.docs.read().len() as u64)
    }

    async fn clear(&self) -> Result<u64> {
        let mut docs = self.docs.write();
        let n = docs.len() as u64;
        docs.clear();
        Ok(n)
    }

    async fn set_cluster_assignments(&self, assignments: &[ClusterAssignment]) -> Result<()> {
        let mut docs = self.docs.write();
        for doc in docs.values_mut() {
            doc.cluster_id = None;
            doc.cluster_name = None;
        }
        for a in assignments {
            if let Some(doc) = docs.get_mut(&a.document_id) {
                doc.cluster_id = Some(a.cluster_id);
                doc.cluster_name = Some(a.cluster_name.clone());
            }
        }
        Ok(())
    }

    async fn clear_cluster_assignments(&self) -> Result<()> {
        self.set_cluster_assignments(&[]).await
    }
}

/// In-memory vector index.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    vectors: RwLock<HashMap<String, VectorRecord>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, record: &VectorRecord) -> Result<()> {
        self.vectors
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.vectors.write().remove(id).is_some())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
        let mut matches: Vec<VectorMatch> = self
            .vectors
            .read()
            .values()
            .map(|r| VectorMatch {
                id: r.id.clone(),
                distance: cosine_distance(vector, &r.vector),
            })
            .collect();
        sort_matches(&mut matches);
        matches.truncate(k);
        Ok(matches)
    }

    async fn all(&self) -> Result<Vec<VectorRecord>> {
        let mut records: Vec<VectorRecord> = self.vectors.read().values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn content_hashes(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .vectors
            .read()
            .values()
            .map(|r| (r.id.clone(), r.content_hash.clone()))
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.vectors.read().len() as u64)
    }

    async fn delete_collection(&self) -> Result<()> {
        self.vectors.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewDocument;

    fn record(id: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            vector,
            content_hash: String::new(),
            model: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let index = InMemoryVectorIndex::new();
        index.upsert(&record("far", vec![0.0, 1.0])).await.unwrap();
        index.upsert(&record("near", vec![1.0, 0.1])).await.unwrap();
        index.upsert(&record("exact", vec![2.0, 0.0])).await.unwrap();

        let hits = index.query(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let index = InMemoryVectorIndex::new();
        index.upsert(&record("a", vec![1.0, 0.0])).await.unwrap();
        index.upsert(&record("a", vec![0.0, 1.0])).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
        assert_eq!(index.all().await.unwrap()[0].vector, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_relational_insert_rejects_duplicates() {
        let store = InMemoryRelationalStore::new();
        let doc = Document::from_new(NewDocument::new("T", "C"));
        store.insert(&doc).await.unwrap();
        assert!(store.insert(&doc).await.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cluster_assignments_replace_previous() {
        let store = InMemoryRelationalStore::new();
        let a = Document::from_new(NewDocument::new("A", "a"));
        let b = Document::from_new(NewDocument::new("B", "b"));
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();

        store
            .set_cluster_assignments(&[ClusterAssignment {
                document_id: a.id.clone(),
                cluster_id: 0,
                cluster_name: "Alpha".into(),
            }])
            .await
            .unwrap();
        store
            .set_cluster_assignments(&[ClusterAssignment {
                document_id: b.id.clone(),
                cluster_id: 1,
                cluster_name: "Beta".into(),
            }])
            .await
            .unwrap();

        let a2 = store.get(&a.id).await.unwrap().unwrap();
        let b2 = store.get(&b.id).await.unwrap().unwrap();
        assert!(a2.cluster_id.is_none());
        assert_eq!(b2.cluster_name.as_deref(), Some("Beta"));
    }
}
