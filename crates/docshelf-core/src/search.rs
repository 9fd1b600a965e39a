//! Semantic search ranking and result formatting.
//!
//! The vector index returns `(id, distance)` pairs; this module turns them
//! into ranked [`SearchHit`]s by hydrating each id from the relational
//! store. The algorithm operates entirely through the store traits, with
//! no database or configuration dependencies.
//!
//! # Ranking
//!
//! 1. Fetch `k` nearest vectors (cosine distance, ascending).
//! 2. Hydrate each id from the relational store; ids without a row are
//!    consistency faults and are dropped from the result (and reported to
//!    the caller so they can be queued for repair).
//! 3. `score = 1 - distance` (cosine similarity).
//! 4. Sort by distance ascending, then id ascending; truncate to `limit`.
//!
//! The score is a ranking signal only. Search always returns up to
//! `limit` hits when that many documents exist, relevant or not.

use anyhow::Result;
use serde::Serialize;

use crate::models::Document;
use crate::store::{RelationalStore, VectorMatch};

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub document: Document,
    /// Cosine similarity, `1 - distance`. Higher is closer.
    pub score: f64,
    /// Cosine distance reported by the vector index.
    pub distance: f64,
}

/// Hydrated hits plus the ids that had a vector but no row.
#[derive(Debug, Default)]
pub struct Hydrated {
    pub hits: Vec<SearchHit>,
    pub orphans: Vec<String>,
}

/// Resolve vector matches to full documents, preserving match order.
pub async fn hydrate<R>(store: &R, matches: &[VectorMatch]) -> Result<Hydrated>
where
    R: RelationalStore + ?Sized,
{
    let mut out = Hydrated::default();
    for m in matches {
        match store.get(&m.id).await? {
            Some(document) => out.hits.push(SearchHit {
                document,
                score: 1.0 - m.distance as f64,
                distance: m.distance as f64,
            }),
            None => out.orphans.push(m.id.clone()),
        }
    }
    Ok(out)
}

/// Sort hits by ascending distance (ties by id) and keep the first `limit`.
pub fn rank(mut hits: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document.id.cmp(&b.document.id))
    });
    hits.dedup_by(|a, b| a.document.id == b.document.id);
    hits.truncate(limit);
    hits
}

/// First `max_chars` characters of `text` on one line, with an ellipsis
/// when truncated.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// Format a timestamp as ISO 8601 with second precision.
pub fn format_ts_iso(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewDocument;
    use crate::store::memory::InMemoryRelationalStore;

    fn hit(id: &str, distance: f64) -> SearchHit {
        let mut document = Document::from_new(NewDocument::new(id, id));
        document.id = id.to_string();
        SearchHit {
            document,
            score: 1.0 - distance,
            distance,
        }
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let hits = vec![hit("c", 0.5), hit("a", 0.1), hit("b", 0.1), hit("d", 0.9)];
        let ranked = rank(hits, 3);
        let ids: Vec<&str> = ranked.iter().map(|h| h.document.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        for w in ranked.windows(2) {
            assert!(w[0].score >= w[1].score);
        }
    }

    #[test]
    fn test_rank_zero_limit() {
        assert!(rank(vec![hit("a", 0.1)], 0).is_empty());
    }

    #[tokio::test]
    async fn test_hydrate_skips_orphans() {
        let store = InMemoryRelationalStore::new();
        let doc = Document::from_new(NewDocument::new("Kept", "body"));
        store.insert(&doc).await.unwrap();

        let matches = vec![
            VectorMatch {
                id: "ghost".into(),
                distance: 0.0,
            },
            VectorMatch {
                id: doc.id.clone(),
                distance: 0.25,
            },
        ];
        let out = hydrate(&store, &matches).await.unwrap();
        assert_eq!(out.hits.len(), 1);
        assert_eq!(out.hits[0].document.id, doc.id);
        assert!((out.hits[0].score - 0.75).abs() < 1e-9);
        assert_eq!(out.orphans, vec!["ghost".to_string()]);
    }

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("short\ntext", 50), "short text");
        assert_eq!(snippet("abcdefghij", 4), "abcd...");
    }
}
