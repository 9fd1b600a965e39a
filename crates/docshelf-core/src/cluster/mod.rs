//! Cluster engine: group a database's documents by embedding similarity.
//!
//! The engine is a pure function of its inputs. Given every live document
//! paired with its vector, it
//!
//! 1. L2-normalizes the vectors (so Euclidean K-means approximates cosine),
//! 2. fits K-means for each candidate `k` in `[min_k, min(max_k, n - 1)]`,
//! 3. scores each partition with a [`ValidityIndex`] and keeps the best
//!    (strictly better only, so ties keep the smaller `k`),
//! 4. picks each cluster's representative (member nearest the centroid)
//!    and derives a label.
//!
//! Persisting the result as the advisory cluster cache is the caller's
//! concern.

pub mod kmeans;
pub mod label;
pub mod validity;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::embedding::{euclidean_distance, l2_normalized};
use crate::error::{ShelfError, ShelfResult};
use crate::models::{Document, DocumentSummary};
use crate::store::ClusterAssignment;

use kmeans::kmeans;
pub use kmeans::KMeansOptions;
pub use validity::{index_by_name, DaviesBouldin, Direction, Silhouette, ValidityIndex};

/// Requested cluster counts for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterParams {
    pub min_k: usize,
    pub max_k: usize,
    /// Skip selection and use exactly this many clusters.
    pub fixed_k: Option<usize>,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            min_k: 2,
            max_k: 10,
            fixed_k: None,
        }
    }
}

impl ClusterParams {
    pub fn range(min_k: usize, max_k: usize) -> Self {
        Self {
            min_k,
            max_k,
            fixed_k: None,
        }
    }

    pub fn fixed(k: usize) -> Self {
        Self {
            min_k: k,
            max_k: k,
            fixed_k: Some(k),
        }
    }

    /// Argument checks that do not depend on the data.
    pub fn validate(&self) -> ShelfResult<()> {
        if let Some(k) = self.fixed_k {
            if k == 0 {
                return Err(ShelfError::InvalidArgument(
                    "fixed_k must be at least 1".into(),
                ));
            }
            return Ok(());
        }
        if self.min_k == 0 {
            return Err(ShelfError::InvalidArgument(
                "min_k must be at least 1".into(),
            ));
        }
        if self.min_k > self.max_k {
            return Err(ShelfError::InvalidArgument(format!(
                "min_k ({}) is greater than max_k ({})",
                self.min_k, self.max_k
            )));
        }
        Ok(())
    }

    /// Fewest documents an invocation with these parameters accepts.
    pub fn required_documents(&self) -> usize {
        match self.fixed_k {
            Some(_) => 1,
            None => self.min_k,
        }
    }
}

/// One cluster of the winning partition.
#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    pub cluster_id: usize,
    pub label: String,
    pub size: usize,
    pub representative_document_id: String,
    /// Members, newest first.
    pub documents: Vec<DocumentSummary>,
}

/// Output of one clustering invocation. A point-in-time snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterResult {
    pub clusters: Vec<Cluster>,
    pub num_clusters: usize,
    /// Name of the validity index that chose `num_clusters`.
    pub validity_index: String,
    /// `None` when the index is undefined for the partition.
    pub validity_score: Option<f64>,
    pub total_documents: usize,
    pub snapshot_at: DateTime<Utc>,
}

impl ClusterResult {
    /// Cache rows for `RelationalStore::set_cluster_assignments`.
    pub fn assignments(&self) -> Vec<ClusterAssignment> {
        self.clusters
            .iter()
            .flat_map(|c| {
                c.documents.iter().map(move |d| ClusterAssignment {
                    document_id: d.id.clone(),
                    cluster_id: c.cluster_id as i64,
                    cluster_name: c.label.clone(),
                })
            })
            .collect()
    }
}

/// A live document paired with its stored vector.
#[derive(Debug, Clone)]
pub struct ClusterInput {
    pub document: Document,
    pub vector: Vec<f32>,
}

/// Runs the partition search with a fixed validity index and K-means
/// settings.
pub struct ClusterEngine {
    index: Box<dyn ValidityIndex>,
    options: KMeansOptions,
}

impl Default for ClusterEngine {
    fn default() -> Self {
        Self::new(Box::new(Silhouette), KMeansOptions::default())
    }
}

impl ClusterEngine {
    pub fn new(index: Box<dyn ValidityIndex>, options: KMeansOptions) -> Self {
        Self { index, options }
    }

    pub fn index_name(&self) -> &'static str {
        self.index.name()
    }

    /// Cluster `inputs` according to `params`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for malformed parameters, or a `fixed_k` larger
    ///   than the number of documents.
    /// - `InsufficientData` when there are fewer documents than `min_k`.
    pub fn run(&self, params: &ClusterParams, inputs: &[ClusterInput]) -> ShelfResult<ClusterResult> {
        params.validate()?;

        let n = inputs.len();
        let required = params.required_documents();
        if n < required {
            return Err(ShelfError::InsufficientData {
                required,
                available: n,
            });
        }
        if let Some(k) = params.fixed_k {
            if k > n {
                return Err(ShelfError::InvalidArgument(format!(
                    "fixed_k ({k}) exceeds the number of documents ({n})"
                )));
            }
        }

        // Stable input order keeps seeded runs reproducible.
        let mut order: Vec<&ClusterInput> = inputs.iter().collect();
        order.sort_by(|a, b| a.document.id.cmp(&b.document.id));

        let points: Vec<Vec<f32>> = order.iter().map(|i| l2_normalized(&i.vector)).collect();
        let dims = points[0].len();
        if points.iter().any(|p| p.len() != dims) {
            return Err(ShelfError::InvalidArgument(
                "vectors have inconsistent dimensions".into(),
            ));
        }

        let distinct = distinct_points(&points);
        let (labels, score) = if distinct < 2 {
            (vec![0; n], None)
        } else if let Some(k) = params.fixed_k {
            self.partition(&points, k)?
        } else {
            self.select(&points, params, distinct)?
        };

        Ok(self.build_result(&order, &points, &labels, score))
    }

    /// Try every candidate `k` and keep the best-scoring partition.
    fn select(
        &self,
        points: &[Vec<f32>],
        params: &ClusterParams,
        distinct: usize,
    ) -> ShelfResult<(Vec<usize>, Option<f64>)> {
        let upper = params.max_k.min(points.len() - 1).min(distinct);
        if params.min_k > upper {
            // No k leaves a meaningful comparison; use the smallest allowed.
            let k = params.min_k.min(distinct);
            debug!(k, "candidate range empty, using single partition");
            return self.partition(points, k);
        }

        let direction = self.index.direction();
        let mut best: Option<(usize, Vec<usize>, Option<f64>)> = None;

        for k in params.min_k..=upper {
            let (labels, score) = self.partition(points, k)?;
            debug!(k, score = ?score, index = self.index.name(), "scored candidate partition");

            let replace = match (&best, score) {
                (None, _) => true,
                (Some((_, _, None)), Some(_)) => true,
                (Some((_, _, Some(current))), Some(s)) => direction.is_better(s, *current),
                _ => false,
            };
            if replace {
                best = Some((k, labels, score));
            }
        }

        let (k, labels, score) = best.ok_or_else(|| {
            ShelfError::InvalidArgument("no candidate cluster count".into())
        })?;
        debug!(k, score = ?score, "selected cluster count");
        Ok((labels, score))
    }

    /// Fit K-means with `k` clusters and score the (densely relabeled)
    /// partition.
    fn partition(&self, points: &[Vec<f32>], k: usize) -> ShelfResult<(Vec<usize>, Option<f64>)> {
        if k <= 1 {
            return Ok((vec![0; points.len()], None));
        }
        let fit = kmeans(points, k, &self.options)
            .map_err(|e| ShelfError::InvalidArgument(e.to_string()))?;
        let labels = relabel_dense(&fit.assignments);
        let score = self.index.score(points, &labels);
        Ok((labels, score))
    }

    fn build_result(
        &self,
        order: &[&ClusterInput],
        points: &[Vec<f32>],
        labels: &[usize],
        score: Option<f64>,
    ) -> ClusterResult {
        let k = labels.iter().max().map_or(0, |m| m + 1);
        let centroids = kmeans::compute_centroids(points, labels, k);

        let mut clusters = Vec::with_capacity(k);
        for (cluster_id, centroid) in centroids.iter().enumerate() {
            let member_idx: Vec<usize> = (0..order.len())
                .filter(|&i| labels[i] == cluster_id)
                .collect();

            let representative = member_idx
                .iter()
                .map(|&i| (i, euclidean_distance(&points[i], centroid)))
                .min_by(|a, b| {
                    a.1.partial_cmp(&b.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| order[a.0].document.id.cmp(&order[b.0].document.id))
                })
                .map(|(i, _)| order[i].document.id.clone())
                .unwrap_or_default();

            let mut members: Vec<&Document> =
                member_idx.iter().map(|&i| &order[i].document).collect();
            members.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            });

            clusters.push(Cluster {
                cluster_id,
                label: label::label_cluster(cluster_id, &members),
                size: members.len(),
                representative_document_id: representative,
                documents: members.iter().map(|d| d.summary()).collect(),
            });
        }

        ClusterResult {
            num_clusters: clusters.len(),
            clusters,
            validity_index: self.index.name().to_string(),
            validity_score: score,
            total_documents: order.len(),
            snapshot_at: Utc::now(),
        }
    }
}

/// Renumber labels `0..k` in order of first appearance, dropping gaps.
fn relabel_dense(assignments: &[usize]) -> Vec<usize> {
    let mut mapping: Vec<Option<usize>> = Vec::new();
    let mut next = 0;
    assignments
        .iter()
        .map(|&a| {
            if a >= mapping.len() {
                mapping.resize(a + 1, None);
            }
            *mapping[a].get_or_insert_with(|| {
                next += 1;
                next - 1
            })
        })
        .collect()
}

fn distinct_points(points: &[Vec<f32>]) -> usize {
    points
        .iter()
        .map(|p| p.iter().map(|x| x.to_bits()).collect::<Vec<u32>>())
        .collect::<HashSet<_>>()
        .len()
}
