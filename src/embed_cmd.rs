//! Vector maintenance commands: `shelf reconcile` and `shelf reembed`.

use anyhow::{bail, Result};

use crate::registry::Registry;

/// Repair drift between the relational store and the vector index.
pub async fn run_reconcile(registry: &Registry, json: bool) -> Result<()> {
    let store = registry.active().await;
    let report = store.reconcile().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("reconcile");
    println!("  orphan vectors removed:   {}", report.orphan_vectors_removed);
    println!("  missing vectors embedded: {}", report.missing_vectors_embedded);
    println!("  stale vectors refreshed:  {}", report.stale_vectors_refreshed);
    if !report.unresolved.is_empty() {
        println!("  unresolved: {}", report.unresolved.len());
        for id in &report.unresolved {
            println!("    {}", id);
        }
    }
    Ok(())
}

/// Recompute every vector from the current document text.
pub async fn run_reembed(registry: &Registry) -> Result<()> {
    let store = registry.active().await;
    let report = store.reembed_all().await?;

    println!("reembed");
    println!("  model: {}", store.embedder().model_name());
    println!("  embedded: {}", report.embedded);
    println!("  failed: {}", report.failed.len());

    if !report.failed.is_empty() {
        bail!(
            "{} document(s) could not be re-embedded; they are queued for `shelf reconcile`",
            report.failed.len()
        );
    }
    Ok(())
}
