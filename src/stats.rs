//! Database statistics and health overview.
//!
//! `shelf stats` summarizes the active database: document and vector
//! counts, the embedding model, queued consistency faults, and size on
//! disk. Anything other than equal counts and zero faults means a
//! `shelf reconcile` is due.

use anyhow::Result;

use crate::registry::Registry;

/// Run the stats command: gather store statistics and print a summary.
pub async fn run_stats(registry: &Registry, json: bool) -> Result<()> {
    let database = registry.active_database()?;
    let store = registry.active().await;
    let stats = store.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Docshelf — Database Stats");
    println!("=========================");
    println!();
    println!("  Database:    {} ({})", database.name, database.id);
    println!("  Size:        {}", format_bytes(stats.database_size_bytes));
    println!("  Accessed:    {}", format_ts_relative(database.last_accessed.timestamp()));
    println!();
    println!("  Documents:   {}", stats.document_count);
    println!(
        "  Vectors:     {} / {}",
        stats.vector_count, stats.document_count
    );
    println!("  Model:       {} ({} dims)", stats.model, stats.dims);

    let faults = store.pending_faults();
    if faults.is_empty() && stats.vector_count == stats.document_count {
        println!("  Consistency: ok");
    } else {
        println!(
            "  Consistency: {} pending fault(s); run `shelf reconcile`",
            faults.len().max(1)
        );
        for fault in faults.iter().take(10) {
            println!("    {:?}  {}", fault.kind, fault.document_id);
        }
    }
    println!();

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
pub fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_short(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_short(ts)
    }
}

fn format_ts_short(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
