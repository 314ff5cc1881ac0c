//! Agglomerative hierarchical clustering.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::trace;

use crate::cluster::{Cluster, Item};
use crate::distance::{centroid, distance, feature_union, Metric};
use crate::vector::Vector;

/// Merges the nearest pair of clusters each round until `k` top-level items
/// remain or the iteration budget runs out. Returns the top-level cluster;
/// merged pairs become nested [`Cluster`] nodes.
///
/// Pairwise centroid distances are cached across rounds, keyed by stable
/// centroid handles rather than object identity.
pub fn hierarchical(
    vectors: &[&Vector],
    k: usize,
    iterations: usize,
    metric: Metric,
    seed: Option<u64>,
) -> Cluster {
    if vectors.is_empty() {
        return Cluster::default();
    }
    let keys = feature_union(vectors);
    let keys: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let mut order: Vec<usize> = (0..vectors.len()).collect();
    order.shuffle(&mut rng);

    let mut items: Vec<Item> = order.iter().map(|&i| Item::Leaf(i)).collect();
    let mut centroids: Vec<Vector> = order.iter().map(|&i| vectors[i].clone()).collect();
    // Stable handle per centroid; merged clusters get fresh handles so that
    // cached distances never alias.
    let mut handles: Vec<usize> = (0..centroids.len()).collect();
    let mut next_handle = centroids.len();
    let mut cache: HashMap<(usize, usize), f64> = HashMap::new();

    for round in 0..iterations {
        if items.len() <= k.max(1) {
            break;
        }
        let mut nearest: Option<(usize, usize)> = None;
        let mut best = f64::INFINITY;
        for i in 0..centroids.len() {
            for j in (i + 1)..centroids.len() {
                let key = pair(handles[i], handles[j]);
                let d = *cache
                    .entry(key)
                    .or_insert_with(|| distance(&centroids[i], &centroids[j], metric));
                if nearest.is_none() || d < best {
                    nearest = Some((i, j));
                    best = d;
                }
            }
        }
        let Some((i, j)) = nearest else { break };
        trace!(round, distance = best, "merging nearest pair");
        // j > i, so remove j first.
        let right = items.remove(j);
        let left = items.remove(i);
        centroids.remove(j);
        centroids.remove(i);
        handles.remove(j);
        handles.remove(i);
        let merged = Cluster::new(vec![left, right]);
        let members: Vec<&Vector> = merged.leaves().iter().map(|&v| vectors[v]).collect();
        centroids.push(centroid(&members, keys.iter().copied()));
        items.push(Item::Cluster(merged));
        handles.push(next_handle);
        next_handle += 1;
    }
    Cluster::new(items)
}

fn pair(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
