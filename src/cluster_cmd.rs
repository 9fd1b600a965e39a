//! `shelf cluster`: group the active database's documents by topic.

use anyhow::Result;

use docshelf_core::cluster::ClusterParams;
use docshelf_core::search::format_ts_iso;

use crate::config::Config;
use crate::registry::Registry;

/// Cluster parameters from the command line, falling back to `[clustering]`.
pub fn params_from_args(
    config: &Config,
    k: Option<usize>,
    min_k: Option<usize>,
    max_k: Option<usize>,
) -> ClusterParams {
    match k {
        Some(k) => ClusterParams::fixed(k),
        None => ClusterParams::range(
            min_k.unwrap_or(config.clustering.min_k),
            max_k.unwrap_or(config.clustering.max_k),
        ),
    }
}

pub async fn run_cluster(registry: &Registry, params: ClusterParams, json: bool) -> Result<()> {
    let store = registry.active().await;
    let result = store.cluster(params).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let score = result
        .validity_score
        .map(|s| format!("{:.3}", s))
        .unwrap_or_else(|| "n/a".to_string());
    println!(
        "{} clusters over {} documents ({} = {}, as of {})",
        result.num_clusters,
        result.total_documents,
        result.validity_index,
        score,
        format_ts_iso(&result.snapshot_at)
    );
    println!();

    for cluster in &result.clusters {
        println!(
            "[{}] {} ({} document{})",
            cluster.cluster_id,
            cluster.label,
            cluster.size,
            if cluster.size == 1 { "" } else { "s" }
        );
        for doc in &cluster.documents {
            let marker = if doc.id == cluster.representative_document_id {
                "*"
            } else {
                " "
            };
            println!("  {} {}  {}", marker, doc.id, doc.title);
        }
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_from_args() {
        let config = Config::minimal();
        assert_eq!(
            params_from_args(&config, None, None, None),
            ClusterParams::range(2, 10)
        );
        assert_eq!(
            params_from_args(&config, None, Some(3), None),
            ClusterParams::range(3, 10)
        );
        assert_eq!(
            params_from_args(&config, Some(4), Some(3), Some(5)),
            ClusterParams::fixed(4)
        );
    }
}
