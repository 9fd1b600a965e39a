//! `shelf search`: semantic search over the active database.

use anyhow::Result;
use serde::Serialize;

use docshelf_core::search::snippet;

use crate::registry::Registry;

#[derive(Debug, Serialize)]
struct SearchResult {
    id: String,
    title: String,
    doc_type: Option<String>,
    score: f64,
    snippet: String,
}

/// Run a search and print ranked results.
pub async fn run_search(
    registry: &Registry,
    query: &str,
    limit: usize,
    json: bool,
) -> Result<()> {
    let store = registry.active().await;
    let hits = store.search(query, limit).await?;

    let results: Vec<SearchResult> = hits
        .iter()
        .map(|hit| SearchResult {
            id: hit.document.id.clone(),
            title: hit.document.title.clone(),
            doc_type: hit.document.doc_type.clone(),
            score: hit.score,
            snippet: snippet(&hit.document.content, 160),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, result.score, result.title);
        println!("    id: {}", result.id);
        println!("    {}", result.snippet);
        println!();
    }

    Ok(())
}
