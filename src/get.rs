//! Document retrieval: `shelf get` and `shelf list`.
//!
//! `get` accepts either a document id or a 1-based position in creation
//! order (`shelf get 3` is the third document ever added that still exists).

use anyhow::Result;
use serde::Serialize;

use docshelf_core::models::Document;
use docshelf_core::search::{format_ts_iso, snippet};

use crate::document_store::DocumentStore;
use crate::registry::Registry;

/// Document response shape for `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub title: String,
    pub doc_type: Option<String>,
    pub tags: Vec<String>,
    pub source: Option<String>,
    pub authors: Option<String>,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
    pub cluster_id: Option<i64>,
    pub cluster_name: Option<String>,
    pub content: String,
}

impl From<&Document> for DocumentResponse {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            doc_type: doc.doc_type.clone(),
            tags: doc.tag_list(),
            source: doc.source.clone(),
            authors: doc.authors.clone(),
            created_at: format_ts_iso(&doc.created_at),
            updated_at: format_ts_iso(&doc.updated_at),
            cluster_id: doc.cluster_id,
            cluster_name: doc.cluster_name.clone(),
            content: doc.content.clone(),
        }
    }
}

/// Resolve `target` as a position when it is a plain number, otherwise as an id.
pub async fn resolve(store: &DocumentStore, target: &str) -> Result<Document> {
    let doc = match target.parse::<usize>() {
        Ok(index) => store.get_by_index(index).await?,
        Err(_) => store.get(target).await?,
    };
    Ok(doc)
}

/// CLI entry point: fetch one document and print it.
pub async fn run_get(registry: &Registry, target: &str, json: bool) -> Result<()> {
    let store = registry.active().await;
    let doc = resolve(&store, target).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&DocumentResponse::from(&doc))?
        );
        return Ok(());
    }

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("title:        {}", doc.title);
    if let Some(ref doc_type) = doc.doc_type {
        println!("type:         {}", doc_type);
    }
    let tags = doc.tag_list();
    if !tags.is_empty() {
        println!("tags:         {}", tags.join(", "));
    }
    if let Some(ref source) = doc.source {
        println!("source:       {}", source);
    }
    if let Some(ref authors) = doc.authors {
        println!("authors:      {}", authors);
    }
    println!("created_at:   {}", format_ts_iso(&doc.created_at));
    println!("updated_at:   {}", format_ts_iso(&doc.updated_at));
    if let Some(ref name) = doc.cluster_name {
        println!("cluster:      {}", name);
    }
    println!();

    println!("--- Content ---");
    println!("{}", doc.content);

    Ok(())
}

/// CLI entry point: list every document, newest first.
pub async fn run_list(registry: &Registry, json: bool) -> Result<()> {
    let store = registry.active().await;
    let docs = store.list().await?;

    if json {
        let out: Vec<DocumentResponse> = docs.iter().map(DocumentResponse::from).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    for doc in &docs {
        let date = doc.created_at.format("%Y-%m-%d");
        let kind = doc.doc_type.as_deref().unwrap_or("text");
        println!("{}  {}  [{}] {}", doc.id, date, kind, doc.title);
        println!("    {}", snippet(&doc.content, 100));
    }
    println!();
    println!("{} document(s)", docs.len());

    Ok(())
}
