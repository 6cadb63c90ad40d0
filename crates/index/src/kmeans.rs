//! Seeded k-means used for both the coarse quantizer and the PQ codebooks.
//!
//! Inputs and centroids are flat row-major buffers. Initialisation is
//! k-means++ driven by a seeded `fastrand` generator; the assignment step runs
//! on rayon but collects in input order, and centroid updates accumulate
//! sequentially, so results are identical across runs and thread counts.

use rayon::prelude::*;

use crate::record::{dot, l2_sq};

pub(crate) const MAX_ITERATIONS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Affinity {
    /// Assign by largest dot product (coarse partitions over unit vectors).
    InnerProduct,
    /// Assign by smallest squared Euclidean distance (residual codebooks).
    Euclidean,
}

/// Index of the closest centroid; lower index wins ties.
pub(crate) fn nearest(point: &[f32], centroids: &[f32], dim: usize, affinity: Affinity) -> usize {
    let mut best = 0usize;
    match affinity {
        Affinity::InnerProduct => {
            let mut best_score = f32::NEG_INFINITY;
            for (idx, centroid) in centroids.chunks_exact(dim).enumerate() {
                let score = dot(point, centroid);
                if score > best_score {
                    best_score = score;
                    best = idx;
                }
            }
        }
        Affinity::Euclidean => {
            let mut best_dist = f32::INFINITY;
            for (idx, centroid) in centroids.chunks_exact(dim).enumerate() {
                let dist = l2_sq(point, centroid);
                if dist < best_dist {
                    best_dist = dist;
                    best = idx;
                }
            }
        }
    }
    best
}

pub(crate) fn assign(data: &[f32], centroids: &[f32], dim: usize, affinity: Affinity) -> Vec<usize> {
    data.par_chunks_exact(dim)
        .map(|point| nearest(point, centroids, dim, affinity))
        .collect()
}

/// Train `k` centroids over `data` (`data.len() / dim` points, at least `k`).
pub(crate) fn train(data: &[f32], dim: usize, k: usize, seed: u64, affinity: Affinity) -> Vec<f32> {
    let mut centroids = init_plus_plus(data, dim, k, seed, affinity);
    let mut assignments: Vec<usize> = Vec::new();

    for _ in 0..MAX_ITERATIONS {
        let next = assign(data, &centroids, dim, affinity);
        if next == assignments {
            break;
        }
        assignments = next;

        let mut sums = vec![0.0f64; k * dim];
        let mut counts = vec![0usize; k];
        for (point, &cluster) in data.chunks_exact(dim).zip(assignments.iter()) {
            counts[cluster] += 1;
            let row = &mut sums[cluster * dim..(cluster + 1) * dim];
            for (dst, &src) in row.iter_mut().zip(point) {
                *dst += src as f64;
            }
        }
        for cluster in 0..k {
            // Empty clusters keep their previous centroid.
            if counts[cluster] == 0 {
                continue;
            }
            let inv = 1.0 / counts[cluster] as f64;
            for d in 0..dim {
                centroids[cluster * dim + d] = (sums[cluster * dim + d] * inv) as f32;
            }
        }
    }
    centroids
}

fn init_plus_plus(data: &[f32], dim: usize, k: usize, seed: u64, affinity: Affinity) -> Vec<f32> {
    let n = data.len() / dim;
    let point = |i: usize| &data[i * dim..(i + 1) * dim];
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut chosen = vec![false; n];
    let mut centroids = Vec::with_capacity(k * dim);

    let first = rng.usize(..n);
    chosen[first] = true;
    centroids.extend_from_slice(point(first));

    // Weight of each point: squared distance to its closest chosen centroid.
    let weight = |p: &[f32], c: &[f32]| -> f64 {
        match affinity {
            Affinity::Euclidean => l2_sq(p, c) as f64,
            Affinity::InnerProduct => {
                let d = (1.0 - dot(p, c)).max(0.0) as f64;
                d * d
            }
        }
    };
    let mut weights: Vec<f64> = (0..n).map(|i| weight(point(i), point(first))).collect();

    while centroids.len() < k * dim {
        let total: f64 = weights.iter().sum();
        let pick = if total > f64::EPSILON {
            let mut target = rng.f64() * total;
            let mut pick = weights.iter().rposition(|w| *w > 0.0).unwrap_or(n - 1);
            for (idx, w) in weights.iter().enumerate() {
                target -= w;
                if target <= 0.0 && *w > 0.0 {
                    pick = idx;
                    break;
                }
            }
            pick
        } else {
            // Every point coincides with a centroid: take the next unused one.
            (0..n).find(|&i| !chosen[i]).unwrap_or(0)
        };
        chosen[pick] = true;
        let new_centroid = point(pick).to_vec();
        for (i, w) in weights.iter_mut().enumerate() {
            *w = w.min(weight(point(i), &new_centroid));
        }
        centroids.extend_from_slice(&new_centroid);
    }
    centroids
}
