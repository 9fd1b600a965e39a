//! Cluster validity indices used to pick `k`.
//!
//! An index scores one partition of the (normalized) vectors. Each index
//! declares whether lower or higher is better; the engine compares
//! candidates through [`Direction::is_better`] and never assumes a sign.

use crate::embedding::euclidean_distance;

/// Which way a validity score improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    /// Strict comparison: equal scores are never "better".
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Direction::Minimize => candidate < incumbent,
            Direction::Maximize => candidate > incumbent,
        }
    }
}

/// A pluggable cluster validity index.
///
/// `labels` must be dense (`0..k`) and the same length as `points`.
/// Returns `None` when the index is undefined for the partition (for
/// example fewer than two clusters).
pub trait ValidityIndex: Send + Sync {
    fn name(&self) -> &'static str;
    fn direction(&self) -> Direction;
    fn score(&self, points: &[Vec<f32>], labels: &[usize]) -> Option<f64>;
}

/// Mean silhouette coefficient. Range `[-1, 1]`, higher is better.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silhouette;

impl ValidityIndex for Silhouette {
    fn name(&self) -> &'static str {
        "silhouette"
    }

    fn direction(&self) -> Direction {
        Direction::Maximize
    }

    fn score(&self, points: &[Vec<f32>], labels: &[usize]) -> Option<f64> {
        let n = points.len();
        let k = cluster_count(labels)?;
        if k < 2 || k >= n {
            return None;
        }

        let sizes = cluster_sizes(labels, k);
        let mut total = 0.0;

        for i in 0..n {
            let own = labels[i];
            // Singleton clusters contribute 0.
            if sizes[own] <= 1 {
                continue;
            }

            let mut sums = vec![0.0f64; k];
            for j in 0..n {
                if i != j {
                    sums[labels[j]] += euclidean_distance(&points[i], &points[j]);
                }
            }

            let a = sums[own] / (sizes[own] - 1) as f64;
            let b = (0..k)
                .filter(|&c| c != own && sizes[c] > 0)
                .map(|c| sums[c] / sizes[c] as f64)
                .fold(f64::INFINITY, f64::min);

            let denom = a.max(b);
            if denom > 0.0 && b.is_finite() {
                total += (b - a) / denom;
            }
        }

        Some(total / n as f64)
    }
}

/// Davies-Bouldin index. Non-negative, lower is better.
#[derive(Debug, Default, Clone, Copy)]
pub struct DaviesBouldin;

impl ValidityIndex for DaviesBouldin {
    fn name(&self) -> &'static str {
        "davies_bouldin"
    }

    fn direction(&self) -> Direction {
        Direction::Minimize
    }

    fn score(&self, points: &[Vec<f32>], labels: &[usize]) -> Option<f64> {
        let k = cluster_count(labels)?;
        if k < 2 {
            return None;
        }

        let centroids = super::kmeans::compute_centroids(points, labels, k);
        let sizes = cluster_sizes(labels, k);

        let mut scatter = vec![0.0f64; k];
        for (p, &c) in points.iter().zip(labels.iter()) {
            scatter[c] += euclidean_distance(p, &centroids[c]);
        }
        for (s, &size) in scatter.iter_mut().zip(sizes.iter()) {
            if size > 0 {
                *s /= size as f64;
            }
        }

        let mut total = 0.0;
        for i in 0..k {
            let mut worst = 0.0f64;
            for j in 0..k {
                if i == j {
                    continue;
                }
                let separation = euclidean_distance(&centroids[i], &centroids[j]);
                let ratio = if separation > 0.0 {
                    (scatter[i] + scatter[j]) / separation
                } else {
                    f64::INFINITY
                };
                worst = worst.max(ratio);
            }
            total += worst;
        }

        let score = total / k as f64;
        score.is_finite().then_some(score)
    }
}

/// Look up an index by its configuration name.
pub fn index_by_name(name: &str) -> Option<Box<dyn ValidityIndex>> {
    match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "silhouette" => Some(Box::new(Silhouette)),
        "davies_bouldin" | "db" => Some(Box::new(DaviesBouldin)),
        _ => None,
    }
}

/// Names accepted by [`index_by_name`].
pub const KNOWN_INDICES: &[&str] = &["silhouette", "davies_bouldin"];

fn cluster_count(labels: &[usize]) -> Option<usize> {
    labels.iter().max().map(|m| m + 1)
}

fn cluster_sizes(labels: &[usize], k: usize) -> Vec<usize> {
    let mut sizes = vec![0usize; k];
    for &l in labels {
        sizes[l] += 1;
    }
    sizes
}
