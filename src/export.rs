//! Export the active database as JSON.
//!
//! Produces one JSON document holding the database entry and every
//! document row, newest first. Vectors are left out; they can always be
//! recomputed from the text.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use docshelf_core::models::{Database, Document};

use crate::registry::Registry;

#[derive(Serialize)]
struct ExportData<'a> {
    database: &'a Database,
    exported_at: String,
    documents: &'a [Document],
}

/// Export documents as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(registry: &Registry, output: Option<&Path>) -> Result<()> {
    let database = registry.active_database()?;
    let documents = registry.active().await.list().await?;

    let data = ExportData {
        database: &database,
        exported_at: chrono::Utc::now().to_rfc3339(),
        documents: &documents,
    };
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!(
                "Exported {} documents from '{}' to {}",
                documents.len(),
                database.name,
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}
