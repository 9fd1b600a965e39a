//! Document write commands: add, update, rename, delete, clear, move.

use anyhow::{bail, Context, Result};
use std::path::Path;

use docshelf_core::models::{DocumentPatch, NewDocument};

use crate::extract;
use crate::get::resolve;
use crate::registry::Registry;

/// Fields shared by `add` and `update`.
#[derive(Debug, Default, Clone)]
pub struct DocumentFields {
    pub title: Option<String>,
    pub content: Option<String>,
    pub doc_type: Option<String>,
    pub tags: Option<String>,
    pub source: Option<String>,
    pub authors: Option<String>,
}

/// Build the document to add, from a file or from explicit fields.
/// Explicit fields override whatever the file supplies.
pub fn new_document(file: Option<&Path>, fields: DocumentFields) -> Result<NewDocument> {
    let mut doc = match file {
        Some(path) => extract::document_from_file(path)
            .with_context(|| format!("Failed to import {}", path.display()))?,
        None => {
            let (Some(title), Some(content)) = (&fields.title, &fields.content) else {
                bail!("add needs --title and --content, or --file");
            };
            NewDocument::new(title.clone(), content.clone())
        }
    };

    if let Some(title) = fields.title {
        doc.title = title;
    }
    if let Some(content) = fields.content {
        doc.content = content;
    }
    if fields.doc_type.is_some() {
        doc.doc_type = fields.doc_type;
    }
    if fields.tags.is_some() {
        doc.tags = fields.tags;
    }
    if fields.source.is_some() {
        doc.source = fields.source;
    }
    if fields.authors.is_some() {
        doc.authors = fields.authors;
    }
    Ok(doc)
}

pub async fn run_add(registry: &Registry, file: Option<&Path>, fields: DocumentFields) -> Result<()> {
    let new = new_document(file, fields)?;
    let doc = registry.active().await.add(new).await?;
    println!("Added {}  {}", doc.id, doc.title);
    Ok(())
}

pub async fn run_update(registry: &Registry, target: &str, fields: DocumentFields) -> Result<()> {
    let patch = DocumentPatch {
        title: fields.title,
        content: fields.content,
        doc_type: fields.doc_type,
        tags: fields.tags,
        source: fields.source,
        authors: fields.authors,
    };
    if patch.is_empty() {
        bail!("nothing to update; pass at least one field");
    }

    let store = registry.active().await;
    let id = resolve(&store, target).await?.id;
    let doc = store.update(&id, patch).await?;
    println!("Updated {}  {}", doc.id, doc.title);
    Ok(())
}

pub async fn run_rename(registry: &Registry, target: &str, title: &str) -> Result<()> {
    let store = registry.active().await;
    let id = resolve(&store, target).await?.id;
    let doc = store.rename(&id, title).await?;
    println!("Renamed {} to '{}'", doc.id, doc.title);
    Ok(())
}

pub async fn run_delete(registry: &Registry, target: &str) -> Result<()> {
    let store = registry.active().await;
    let doc = resolve(&store, target).await?;
    store.delete(&doc.id).await?;
    println!("Deleted {}  {}", doc.id, doc.title);
    Ok(())
}

pub async fn run_clear(registry: &Registry, yes: bool) -> Result<()> {
    let database = registry.active_database()?;
    if !yes {
        bail!(
            "refusing to delete every document in '{}' without --yes",
            database.name
        );
    }
    let removed = registry.active().await.clear_all().await?;
    println!("Removed {} document(s) from '{}'", removed, database.name);
    Ok(())
}

pub async fn run_move(registry: &Registry, target: &str, to: &str) -> Result<()> {
    let id = {
        let store = registry.active().await;
        resolve(&store, target).await?.id
    };
    let destination = registry.get(to)?;
    let doc = registry.move_document(&id, to).await?;
    println!(
        "Moved '{}' to '{}' (new id {})",
        doc.title, destination.name, doc.id
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_needs_title_and_content() {
        assert!(new_document(None, DocumentFields::default()).is_err());
        let doc = new_document(
            None,
            DocumentFields {
                title: Some("T".into()),
                content: Some("C".into()),
                tags: Some("a,b".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(doc.title, "T");
        assert_eq!(doc.tags.as_deref(), Some("a,b"));
    }

    #[test]
    fn test_new_document_from_file_with_title_override() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("draft.md");
        std::fs::write(&path, "# Draft\n\nbody").unwrap();

        let doc = new_document(
            Some(&path),
            DocumentFields {
                title: Some("Final".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(doc.title, "Final");
        assert!(doc.content.contains("body"));
    }
}
