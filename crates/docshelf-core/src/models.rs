//! Core data models: documents, patches, summaries, and database entries.
//!
//! A [`Document`] row lives in the relational store; its embedding lives
//! in the vector index under the same `id`. The `content_hash` field is the
//! SHA-256 of the canonical text the vector was derived from, which lets a
//! reconcile pass notice vectors that no longer match their row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub doc_type: Option<String>,
    /// Comma-separated tags.
    pub tags: Option<String>,
    /// URL or other provenance reference.
    pub source: Option<String>,
    pub authors: Option<String>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Advisory cache of the most recent clustering run.
    pub cluster_id: Option<i64>,
    pub cluster_name: Option<String>,
}

impl Document {
    /// Build a fresh document with a new id and both timestamps set to now.
    pub fn from_new(new: NewDocument) -> Self {
        let now = now_millis();
        let content_hash = hash_text(&canonical_text(&new.title, &new.content));
        Self {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            content: new.content,
            doc_type: new.doc_type,
            tags: new.tags,
            source: new.source,
            authors: new.authors,
            content_hash,
            created_at: now,
            updated_at: now,
            cluster_id: None,
            cluster_name: None,
        }
    }

    /// Text fed to the embedding provider for this document.
    pub fn canonical_text(&self) -> String {
        canonical_text(&self.title, &self.content)
    }

    /// Tags split on commas, trimmed, empties dropped.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .map(|t| {
                t.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            doc_type: self.doc_type.clone(),
            created_at: self.created_at,
        }
    }

    /// Carry this document's fields into a new-document request, used when
    /// copying into another database.
    pub fn to_new(&self) -> NewDocument {
        NewDocument {
            title: self.title.clone(),
            content: self.content.clone(),
            doc_type: self.doc_type.clone(),
            tags: self.tags.clone(),
            source: self.source.clone(),
            authors: self.authors.clone(),
        }
    }
}

/// Input for `add`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    pub doc_type: Option<String>,
    pub tags: Option<String>,
    pub source: Option<String>,
    pub authors: Option<String>,
}

impl NewDocument {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = Some(authors.into());
        self
    }
}

/// Partial update for `update`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub doc_type: Option<String>,
    pub tags: Option<String>,
    pub source: Option<String>,
    pub authors: Option<String>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.doc_type.is_none()
            && self.tags.is_none()
            && self.source.is_none()
            && self.authors.is_none()
    }

    /// Apply onto a copy of `doc`. Returns the patched document and whether
    /// the canonical text changed (which forces a re-embed).
    pub fn apply(&self, doc: &Document) -> (Document, bool) {
        let mut next = doc.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(content) = &self.content {
            next.content = content.clone();
        }
        if let Some(doc_type) = &self.doc_type {
            next.doc_type = Some(doc_type.clone());
        }
        if let Some(tags) = &self.tags {
            next.tags = Some(tags.clone());
        }
        if let Some(source) = &self.source {
            next.source = Some(source.clone());
        }
        if let Some(authors) = &self.authors {
            next.authors = Some(authors.clone());
        }
        let text_changed = next.title != doc.title || next.content != doc.content;
        if text_changed {
            next.content_hash = hash_text(&next.canonical_text());
        }
        (next, text_changed)
    }
}

/// Lightweight member listing used inside cluster results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub doc_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A registry entry for one independent database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Denormalized; refreshed whenever the registry lists databases.
    #[serde(default, skip_serializing)]
    pub document_count: u64,
}

/// Current time truncated to the millisecond precision the stores keep.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Text embedded for a document: title and content joined by a blank line.
pub fn canonical_text(title: &str, content: &str) -> String {
    format!("{}\n\n{}", title, content)
}

/// SHA-256 hex digest of `text`.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_new_sets_hash_and_timestamps() {
        let doc = Document::from_new(NewDocument::new("Title", "Body").with_doc_type("note"));
        assert_eq!(doc.content_hash, hash_text("Title\n\nBody"));
        assert_eq!(doc.created_at, doc.updated_at);
        assert_eq!(doc.doc_type.as_deref(), Some("note"));
        assert!(doc.cluster_id.is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Document::from_new(NewDocument::new("a", "b"));
        let b = Document::from_new(NewDocument::new("a", "b"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_patch_metadata_only_keeps_hash() {
        let doc = Document::from_new(NewDocument::new("T", "C"));
        let patch = DocumentPatch {
            tags: Some("x,y".into()),
            ..Default::default()
        };
        let (next, changed) = patch.apply(&doc);
        assert!(!changed);
        assert_eq!(next.content_hash, doc.content_hash);
        assert_eq!(next.tag_list(), vec!["x", "y"]);
    }

    #[test]
    fn test_patch_content_changes_hash() {
        let doc = Document::from_new(NewDocument::new("T", "C"));
        let patch = DocumentPatch {
            content: Some("C2".into()),
            ..Default::default()
        };
        let (next, changed) = patch.apply(&doc);
        assert!(changed);
        assert_ne!(next.content_hash, doc.content_hash);
    }

    #[test]
    fn test_patch_same_value_is_not_a_change() {
        let doc = Document::from_new(NewDocument::new("T", "C"));
        let patch = DocumentPatch {
            title: Some("T".into()),
            ..Default::default()
        };
        let (_, changed) = patch.apply(&doc);
        assert!(!changed);
    }

    #[test]
    fn test_tag_list_trims_and_skips_empty() {
        let doc = Document::from_new(NewDocument::new("T", "C").with_tags(" rust, ,async ,"));
        assert_eq!(doc.tag_list(), vec!["rust", "async"]);
    }
}
