//! k-means clustering (Lloyd's algorithm) with random or k-means++ seeding.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::trace;

use crate::distance::{centroid, distance, feature_union, Metric};
use crate::vector::Vector;

/// How the initial partition is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seeding {
    /// Random round-robin assignment over a shuffled order.
    Random,
    /// k-means++: centers picked iteratively, weighted by squared distance
    /// to the nearest already-chosen center, with a bounded number of local
    /// retries per center to reduce variance.
    KmeansPlusPlus,
}

#[derive(Debug, Clone)]
pub struct KMeansOptions {
    pub k: usize,
    /// Iteration budget; the algorithm also stops at the first full pass
    /// without a reassignment. No convergence guarantee is claimed.
    pub iterations: usize,
    pub metric: Metric,
    pub seeding: Seeding,
    /// Relaxation factor `p` for the triangle-inequality bound. Cosine
    /// distance is a semimetric, so the bound is a performance heuristic
    /// rather than a correctness guarantee; lower values prune less.
    pub relaxation: f64,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl KMeansOptions {
    pub fn new(k: usize) -> Self {
        KMeansOptions {
            k,
            iterations: 10,
            metric: Metric::Cosine,
            seeding: Seeding::Random,
            relaxation: 0.8,
            seed: None,
        }
    }
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

/// Partitions the given vectors into `k` clusters of handle indices.
///
/// With `k < 2` every vector lands in a single cluster, regardless of
/// seeding. Empty clusters can occur and are preserved.
pub fn k_means(vectors: &[&Vector], opts: &KMeansOptions) -> Vec<Vec<usize>> {
    if vectors.is_empty() {
        return Vec::new();
    }
    if opts.k < 2 {
        return vec![(0..vectors.len()).collect()];
    }
    let mut rng = rng_for(opts.seed);
    let keys = feature_union(vectors);
    let keys: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();

    let mut clusters: Vec<Vec<usize>> = match opts.seeding {
        Seeding::KmeansPlusPlus => kmpp(vectors, opts.k, opts.metric, &mut rng),
        Seeding::Random => {
            let mut order: Vec<usize> = (0..vectors.len()).collect();
            order.shuffle(&mut rng);
            let mut clusters = vec![Vec::new(); opts.k];
            for (i, v) in order.into_iter().enumerate() {
                clusters[i % opts.k].push(v);
            }
            clusters
        }
    };

    for iteration in 0..opts.iterations {
        let centroids: Vec<Vector> = clusters
            .iter()
            .map(|cluster| {
                let members: Vec<&Vector> = cluster.iter().map(|&i| vectors[i]).collect();
                centroid(&members, keys.iter().copied())
            })
            .collect();
        // Relaxed triangle inequality between centroid pairs (Elkan, 2003):
        // when bound(i, j) is not under the vector's current distance, the
        // exact distance to centroid j cannot win and is skipped.
        let p = 0.5 * opts.relaxation;
        let bounds: Vec<Vec<f64>> = (0..centroids.len())
            .map(|i| {
                (0..centroids.len())
                    .map(|j| p * distance(&centroids[i], &centroids[j], opts.metric))
                    .collect()
            })
            .collect();

        let assignments: Vec<(usize, usize)> = clusters
            .iter()
            .enumerate()
            .flat_map(|(i, cluster)| cluster.iter().map(move |&v| (v, i)))
            .collect();
        let reassigned: Vec<(usize, usize)> = assignments
            .par_iter()
            .map(|&(v, i)| {
                let d1 = distance(vectors[v], &centroids[i], opts.metric);
                let mut nearest = i;
                let mut best = d1;
                for j in 0..centroids.len() {
                    if j != i && bounds[i][j] < d1 {
                        let d2 = distance(vectors[v], &centroids[j], opts.metric);
                        if d2 < best {
                            nearest = j;
                            best = d2;
                        }
                    }
                }
                (v, nearest)
            })
            .collect();

        let converged = reassigned
            .iter()
            .zip(&assignments)
            .all(|(a, b)| a.1 == b.1);
        let mut next = vec![Vec::new(); opts.k];
        for &(v, cluster) in &reassigned {
            next[cluster].push(v);
        }
        clusters = next;
        trace!(iteration, converged, "k-means pass");
        if converged {
            break;
        }
    }
    clusters
}

/// k-means++ seeding: returns an initial partition where each vector is
/// assigned to its nearest chosen center.
fn kmpp(vectors: &[&Vector], k: usize, metric: Metric, rng: &mut StdRng) -> Vec<Vec<usize>> {
    let first = rng.random_range(0..vectors.len());
    let mut centers = vec![first];
    let mut d: Vec<f64> = vectors
        .iter()
        .map(|v| distance(v, vectors[first], metric))
        .collect();
    let mut s: f64 = d.iter().sum();
    let retries = 2 + (k as f64).ln() as usize;
    for _ in 1..k {
        let mut chosen = 0;
        for _ in 0..retries {
            // Sample an index proportionally to its distance mass, then keep
            // the candidate yielding the smallest total distance sum.
            let mut y = rng.random::<f64>() * s;
            let mut candidate = vectors.len() - 1;
            for (i, &di) in d.iter().enumerate() {
                if y <= di {
                    candidate = i;
                    break;
                }
                y -= di;
            }
            let s1: f64 = d
                .iter()
                .enumerate()
                .map(|(j, &dj)| dj.min(distance(vectors[candidate], vectors[j], metric)))
                .sum();
            if s1 < s {
                s = s1;
                chosen = candidate;
            }
        }
        centers.push(chosen);
        for (j, dj) in d.iter_mut().enumerate() {
            *dj = dj.min(distance(vectors[j], vectors[chosen], metric));
        }
        s = d.iter().sum();
    }
    let mut clusters = vec![Vec::new(); k];
    for (i, v) in vectors.iter().enumerate() {
        let nearest = centers
            .iter()
            .enumerate()
            .map(|(c, &center)| (c, distance(v, vectors[center], metric)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, _)| c)
            .unwrap_or(0);
        clusters[nearest].push(i);
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(pairs: &[(&str, f64)]) -> Vector {
        Vector::new(pairs.iter().map(|&(k, w)| (k, w)))
    }

    fn sample() -> Vec<Vector> {
        vec![
            v(&[("x", 1.0), ("y", 0.1)]),
            v(&[("x", 0.9), ("y", 0.2)]),
            v(&[("x", 1.1)]),
            v(&[("z", 1.0), ("w", 0.3)]),
            v(&[("z", 0.8), ("w", 0.4)]),
            v(&[("z", 1.2), ("w", 0.1)]),
        ]
    }

    fn refs(vectors: &[Vector]) -> Vec<&Vector> {
        vectors.iter().collect()
    }

    #[test]
    fn k_below_two_returns_everything_in_one_cluster() {
        let vectors = sample();
        for seeding in [Seeding::Random, Seeding::KmeansPlusPlus] {
            let opts = KMeansOptions {
                seeding,
                ..KMeansOptions::new(1)
            };
            let clusters = k_means(&refs(&vectors), &opts);
            assert_eq!(clusters.len(), 1);
            assert_eq!(clusters[0].len(), vectors.len());
        }
    }

    #[test]
    fn separates_two_obvious_groups() {
        let vectors = sample();
        let opts = KMeansOptions {
            seed: Some(7),
            iterations: 50,
            ..KMeansOptions::new(2)
        };
        let clusters = k_means(&refs(&vectors), &opts);
        let of = |i: usize| clusters.iter().position(|c| c.contains(&i)).unwrap();
        assert_eq!(of(0), of(1));
        assert_eq!(of(0), of(2));
        assert_eq!(of(3), of(4));
        assert_eq!(of(3), of(5));
        assert_ne!(of(0), of(3));
    }

    #[test]
    fn kmpp_seeding_also_separates_groups() {
        let vectors = sample();
        let opts = KMeansOptions {
            seed: Some(11),
            iterations: 50,
            seeding: Seeding::KmeansPlusPlus,
            ..KMeansOptions::new(2)
        };
        let clusters = k_means(&refs(&vectors), &opts);
        let of = |i: usize| clusters.iter().position(|c| c.contains(&i)).unwrap();
        assert_eq!(of(0), of(2));
        assert_eq!(of(3), of(5));
        assert_ne!(of(0), of(3));
    }

    #[test]
    fn every_vector_is_assigned_exactly_once() {
        let vectors = sample();
        let opts = KMeansOptions {
            seed: Some(3),
            ..KMeansOptions::new(3)
        };
        let clusters = k_means(&refs(&vectors), &opts);
        let mut seen: Vec<usize> = clusters.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..vectors.len()).collect::<Vec<_>>());
    }

    #[test]
    fn pruning_agrees_with_unpruned_reference() {
        // relaxation = 0 makes every bound 0, so no candidate is skipped.
        // The default heuristic must produce the same clusters on
        // well-separated data.
        let vectors = sample();
        let pruned = KMeansOptions {
            seed: Some(21),
            iterations: 50,
            ..KMeansOptions::new(2)
        };
        let reference = KMeansOptions {
            relaxation: 0.0,
            ..pruned.clone()
        };
        let a = k_means(&refs(&vectors), &pruned);
        let b = k_means(&refs(&vectors), &reference);
        let normalize = |mut c: Vec<Vec<usize>>| {
            for cluster in &mut c {
                cluster.sort_unstable();
            }
            c.sort();
            c
        };
        assert_eq!(normalize(a), normalize(b));
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        let clusters = k_means(&[], &KMeansOptions::new(4));
        assert!(clusters.is_empty());
    }
}
