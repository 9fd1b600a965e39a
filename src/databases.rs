//! `shelf db ...`: manage the set of databases.

use anyhow::Result;

use crate::registry::Registry;
use crate::stats::format_ts_relative;

pub async fn run_db_list(registry: &Registry, json: bool) -> Result<()> {
    let active = registry.active_database()?.id;
    let databases = registry.list().await?;

    if json {
        let out: Vec<serde_json::Value> = databases
            .iter()
            .map(|d| {
                serde_json::json!({
                    "id": d.id,
                    "name": d.name,
                    "description": d.description,
                    "document_count": d.document_count,
                    "created_at": d.created_at,
                    "last_accessed": d.last_accessed,
                    "active": d.id == active,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "  {:<14} {:<24} {:>6}   {}",
        "ID", "NAME", "DOCS", "LAST USED"
    );
    println!("  {}", "-".repeat(60));
    for d in &databases {
        let marker = if d.id == active { "*" } else { " " };
        println!(
            "{} {:<14} {:<24} {:>6}   {}",
            marker,
            d.id,
            d.name,
            d.document_count,
            format_ts_relative(d.last_accessed.timestamp())
        );
    }
    Ok(())
}

pub async fn run_db_create(
    registry: &Registry,
    name: &str,
    description: Option<&str>,
    switch: bool,
) -> Result<()> {
    let database = registry.create(name, description).await?;
    println!("Created database '{}' ({})", database.name, database.id);
    if switch {
        registry.activate(&database.id).await?;
        println!("Switched to '{}'", database.name);
    }
    Ok(())
}

pub async fn run_db_switch(registry: &Registry, id: &str) -> Result<()> {
    let database = registry.activate(id).await?;
    println!("Switched to '{}' ({})", database.name, database.id);
    Ok(())
}

pub async fn run_db_update(
    registry: &Registry,
    id: &str,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let database = registry.update(id, name, description)?;
    println!("Updated database '{}' ({})", database.name, database.id);
    Ok(())
}

pub async fn run_db_delete(registry: &Registry, id: &str) -> Result<()> {
    let database = registry.get(id)?;
    registry.delete(id).await?;
    println!("Deleted database '{}' ({})", database.name, database.id);
    Ok(())
}
