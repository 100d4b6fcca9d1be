//! Deterministic k-means clustering

use crate::error::{EngineError, Result};
use crate::segmentation::ClusteringStrategy;

/// Lloyd's algorithm seeded from monetary quantiles
///
/// Seeding is deterministic so identical inputs always yield identical
/// assignments. Clusters that lose all members keep their last centroid and
/// stay empty.
#[derive(Debug, Clone)]
pub struct KMeans {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

impl ClusteringStrategy for KMeans {
    fn assign(&self, points: &[[f64; 2]], k: usize) -> Result<Vec<usize>> {
        if k == 0 {
            return Err(EngineError::Strategy("k must be at least 1".to_string()));
        }
        if points.is_empty() {
            return Ok(Vec::new());
        }
        if k >= points.len() {
            return Ok((0..points.len()).collect());
        }

        let mut centroids = seed_centroids(points, k);
        let mut assignments = vec![0; points.len()];

        for iteration in 0..self.max_iterations {
            for (point, assignment) in points.iter().zip(assignments.iter_mut()) {
                *assignment = nearest(point, &centroids);
            }

            let mut sums = vec![[0.0_f64; 2]; k];
            let mut counts = vec![0_usize; k];
            for (point, &cluster) in points.iter().zip(&assignments) {
                sums[cluster][0] += point[0];
                sums[cluster][1] += point[1];
                counts[cluster] += 1;
            }

            let mut shift = 0.0_f64;
            for cluster in 0..k {
                if counts[cluster] == 0 {
                    continue;
                }
                let n = counts[cluster] as f64;
                let updated = [sums[cluster][0] / n, sums[cluster][1] / n];
                shift = shift.max(distance(&updated, &centroids[cluster]));
                centroids[cluster] = updated;
            }

            if shift <= self.tolerance {
                tracing::debug!("k-means converged after {} iterations", iteration + 1);
                break;
            }
        }

        Ok(assignments)
    }
}

fn seed_centroids(points: &[[f64; 2]], k: usize) -> Vec<[f64; 2]> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| points[a][1].total_cmp(&points[b][1]).then(a.cmp(&b)));

    if k == 1 {
        let n = points.len() as f64;
        let sum = points
            .iter()
            .fold([0.0, 0.0], |acc, p| [acc[0] + p[0], acc[1] + p[1]]);
        return vec![[sum[0] / n, sum[1] / n]];
    }

    let last = points.len() - 1;
    (0..k)
        .map(|i| points[order[i * last / (k - 1)]])
        .collect()
}

fn nearest(point: &[f64; 2], centroids: &[[f64; 2]]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let d = distance(point, centroid);
        if d < best_distance {
            best = index;
            best_distance = d;
        }
    }
    best
}

fn distance(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}
