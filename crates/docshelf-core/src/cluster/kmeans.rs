//! Seeded K-means with K-means++ initialization.
//!
//! Inputs are expected to be L2-normalized already (the engine does this),
//! so plain Euclidean distance is used throughout. Every random choice goes
//! through a `StdRng` seeded from the caller's seed and `k`, which makes a
//! run fully reproducible for the same input order.
//!
//! # Algorithm Details
//! - Initialization: K-means++ (D² sampling)
//! - Restarts: `n_init` independent seeds, lowest inertia wins
//! - Empty clusters: re-seeded with the point farthest from its centroid
//! - Stops when no assignment changes or centroids move less than
//!   [`CONVERGENCE_TOLERANCE`]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::embedding::euclidean_distance;

/// Convergence tolerance for centroid movement.
pub const CONVERGENCE_TOLERANCE: f64 = 1e-6;

const EPSILON: f64 = 1e-12;

#[derive(Error, Debug, PartialEq)]
pub enum ClusteringError {
    #[error("Empty vector set provided for clustering")]
    EmptyVectorSet,

    #[error("Invalid cluster count: {0} (must be between 1 and the number of vectors)")]
    InvalidClusterCount(usize),

    #[error("Dimension mismatch in vectors: all vectors must come from the same embedding model")]
    DimensionMismatch,
}

/// Result of one K-means fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Cluster centroids (mean of assigned points).
    pub centroids: Vec<Vec<f32>>,
    /// Cluster index in `0..k` for each input point.
    pub assignments: Vec<usize>,
    /// Sum of squared distances from points to their centroid.
    pub inertia: f64,
    /// Iterations used by the winning restart.
    pub iterations: usize,
}

/// Fit settings.
#[derive(Debug, Clone, Copy)]
pub struct KMeansOptions {
    pub seed: u64,
    pub n_init: usize,
    pub max_iterations: usize,
}

impl Default for KMeansOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            n_init: 10,
            max_iterations: 300,
        }
    }
}

/// Partition `points` into `k` clusters.
///
/// Runs `n_init` seeded restarts and keeps the lowest-inertia one.
/// Ties keep the earlier restart.
#[must_use = "clustering results should be used or the computation is wasted"]
pub fn kmeans(
    points: &[Vec<f32>],
    k: usize,
    options: &KMeansOptions,
) -> Result<KMeansResult, ClusteringError> {
    if points.is_empty() {
        return Err(ClusteringError::EmptyVectorSet);
    }
    if k == 0 || k > points.len() {
        return Err(ClusteringError::InvalidClusterCount(k));
    }
    let dimension = points[0].len();
    if points.iter().any(|p| p.len() != dimension) {
        return Err(ClusteringError::DimensionMismatch);
    }

    let mut rng = StdRng::seed_from_u64(options.seed ^ (k as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    let mut best: Option<KMeansResult> = None;

    for _ in 0..options.n_init.max(1) {
        let run = lloyd(points, k, options.max_iterations.max(1), &mut rng);
        let better = match &best {
            Some(b) => run.inertia + EPSILON < b.inertia,
            None => true,
        };
        if better {
            best = Some(run);
        }
    }

    best.ok_or(ClusteringError::EmptyVectorSet)
}

fn lloyd(points: &[Vec<f32>], k: usize, max_iterations: usize, rng: &mut StdRng) -> KMeansResult {
    let mut centroids = init_plus_plus(points, k, rng);
    let mut assignments = vec![usize::MAX; points.len()];
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;

        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let nearest = nearest_centroid(p, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        fill_empty_clusters(points, &mut assignments, &centroids, k);
        let next = compute_centroids(points, &assignments, k);
        let movement = centroids
            .iter()
            .zip(next.iter())
            .map(|(a, b)| euclidean_distance(a, b))
            .fold(0.0, f64::max);
        centroids = next;

        if !changed || movement < CONVERGENCE_TOLERANCE {
            break;
        }
    }

    let inertia = points
        .iter()
        .zip(assignments.iter())
        .map(|(p, &c)| euclidean_distance(p, &centroids[c]).powi(2))
        .sum();

    KMeansResult {
        centroids,
        assignments,
        inertia,
        iterations,
    }
}

/// K-means++: first centroid uniformly at random, each next one sampled
/// with probability proportional to squared distance to the nearest
/// already-chosen centroid.
fn init_plus_plus(points: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..points.len())].clone());

    while centroids.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| euclidean_distance(p, c).powi(2))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        if total < EPSILON {
            // Every point coincides with a chosen centroid.
            centroids.push(points[rng.random_range(0..points.len())].clone());
            continue;
        }

        let target = rng.random::<f64>() * total;
        let mut cumulative = 0.0;
        let mut chosen = points.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            cumulative += w;
            if cumulative >= target && *w > 0.0 {
                chosen = i;
                break;
            }
        }
        centroids.push(points[chosen].clone());
    }

    centroids
}

/// Index of the closest centroid; ties go to the lower index.
pub fn nearest_centroid(point: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = euclidean_distance(point, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Give every empty cluster the point farthest from its current centroid,
/// taken from a cluster that can spare one.
fn fill_empty_clusters(
    points: &[Vec<f32>],
    assignments: &mut [usize],
    centroids: &[Vec<f32>],
    k: usize,
) {
    let mut sizes = vec![0usize; k];
    for &a in assignments.iter() {
        sizes[a] += 1;
    }

    for empty in 0..k {
        if sizes[empty] > 0 {
            continue;
        }
        let donor = assignments
            .iter()
            .enumerate()
            .filter(|(_, &c)| sizes[c] > 1)
            .map(|(i, &c)| (i, euclidean_distance(&points[i], &centroids[c])))
            .fold(None::<(usize, f64)>, |acc, (i, d)| match acc {
                Some((_, best)) if best >= d => acc,
                _ => Some((i, d)),
            });
        if let Some((i, _)) = donor {
            sizes[assignments[i]] -= 1;
            assignments[i] = empty;
            sizes[empty] += 1;
        }
    }
}

/// Mean of the points assigned to each cluster. Clusters left empty keep
/// a zero centroid.
pub fn compute_centroids(points: &[Vec<f32>], assignments: &[usize], k: usize) -> Vec<Vec<f32>> {
    let dimension = points.first().map(|p| p.len()).unwrap_or(0);
    let mut sums = vec![vec![0.0f64; dimension]; k];
    let mut counts = vec![0usize; k];

    for (p, &c) in points.iter().zip(assignments.iter()) {
        for (s, &x) in sums[c].iter_mut().zip(p.iter()) {
            *s += x as f64;
        }
        counts[c] += 1;
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            if count == 0 {
                vec![0.0; dimension]
            } else {
                sum.into_iter().map(|s| (s / count as f64) as f32).collect()
            }
        })
        .collect()
}
