//! A balanced k-d tree for nearest-neighbor queries over sparse vectors.

use crate::distance::{distance, feature_union, Metric};
use crate::vector::Vector;

struct Node {
    /// Handle of the pivot vector in the arena.
    pivot: usize,
    axis: Box<str>,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

/// A partitioned vector space that is (sometimes) faster for nearest
/// neighbor search. Every pivot splits the space on one feature; the split
/// feature cycles through the sorted feature set by depth.
pub struct KdTree {
    vectors: Vec<Vector>,
    root: Option<Box<Node>>,
}

impl KdTree {
    /// Builds a balanced tree: each level pivots on the median vector under
    /// the level's split feature, ties keeping their original order.
    pub fn build(vectors: Vec<Vector>) -> Self {
        let refs: Vec<&Vector> = vectors.iter().collect();
        let mut keys: Vec<Box<str>> = feature_union(&refs).into_iter().collect();
        keys.sort_unstable();
        let handles: Vec<usize> = (0..vectors.len()).collect();
        let root = balance(&vectors, handles, &keys, 0);
        KdTree { vectors, root }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The `k` vectors nearest to `target` as (distance, handle) pairs,
    /// nearest first. An exact match of the target itself is excluded, so a
    /// vector can be queried against a tree that contains it.
    pub fn nearest_neighbors(&self, target: &Vector, k: usize, metric: Metric) -> Vec<(f64, usize)> {
        let mut best = BestList::new(k + 1);
        if let Some(root) = &self.root {
            self.search(root, target, metric, &mut best);
        }
        let mut hits = best.entries;
        hits.retain(|&(_, handle)| &self.vectors[handle] != target);
        hits.truncate(k);
        hits
    }

    fn search(&self, node: &Node, target: &Vector, metric: Metric, best: &mut BestList) {
        if node.left.is_none() && node.right.is_none() {
            best.update(self.measure(node.pivot, target, metric), node.pivot);
            return;
        }
        // Compare along the split feature to pick the near subtree; the far
        // subtree is only visited when the hypersphere of the current worst
        // candidate crosses the splitting hyperplane.
        let pivot = &self.vectors[node.pivot];
        let (near, far) = if target.get(&node.axis, 0.0) < pivot.get(&node.axis, 0.0) {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };
        if let Some(child) = near {
            self.search(child, target, metric, best);
        }
        best.update(self.measure(node.pivot, target, metric), node.pivot);
        if let Some(child) = far {
            let axis_distance = distance(
                &Vector::new([(node.axis.clone(), pivot.get(&node.axis, 0.0))]),
                &Vector::new([(node.axis.clone(), target.get(&node.axis, 0.0))]),
                metric,
            );
            if !best.full() || axis_distance <= best.worst() {
                self.search(child, target, metric, best);
            }
        }
    }

    fn measure(&self, handle: usize, target: &Vector, metric: Metric) -> f64 {
        distance(&self.vectors[handle], target, metric)
    }
}

fn balance(
    vectors: &[Vector],
    mut handles: Vec<usize>,
    keys: &[Box<str>],
    depth: usize,
) -> Option<Box<Node>> {
    if handles.is_empty() || keys.is_empty() {
        return None;
    }
    let axis = &keys[depth % keys.len()];
    // Stable sort keeps the original order on equal feature values.
    handles.sort_by(|&a, &b| {
        vectors[a]
            .get(axis, 0.0)
            .total_cmp(&vectors[b].get(axis, 0.0))
    });
    let m = handles.len() / 2;
    let right = handles.split_off(m + 1);
    let pivot = handles.pop()?;
    Some(Box::new(Node {
        pivot,
        axis: axis.clone(),
        left: balance(vectors, handles, keys, depth + 1),
        right: balance(vectors, right, keys, depth + 1),
    }))
}

/// A sorted, size-capped list of (distance, handle) candidates.
struct BestList {
    cap: usize,
    entries: Vec<(f64, usize)>,
}

impl BestList {
    fn new(cap: usize) -> Self {
        BestList {
            cap,
            entries: Vec::with_capacity(cap),
        }
    }

    fn full(&self) -> bool {
        self.entries.len() >= self.cap
    }

    fn worst(&self) -> f64 {
        self.entries.last().map_or(f64::INFINITY, |&(d, _)| d)
    }

    fn update(&mut self, d: f64, handle: usize) {
        if self.entries.iter().any(|&(_, h)| h == handle) {
            return;
        }
        if !self.full() || self.worst() > d {
            let at = self
                .entries
                .partition_point(|&(existing, _)| existing <= d);
            self.entries.insert(at, (d, handle));
            self.entries.truncate(self.cap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn v(pairs: &[(&str, f64)]) -> Vector {
        Vector::new(pairs.iter().map(|&(k, w)| (k, w)))
    }

    fn brute_force(
        vectors: &[Vector],
        target: &Vector,
        k: usize,
        metric: Metric,
    ) -> Vec<(f64, usize)> {
        let mut all: Vec<(f64, usize)> = vectors
            .iter()
            .enumerate()
            .filter(|(_, v)| *v != target)
            .map(|(i, v)| (distance(v, target, metric), i))
            .collect();
        all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        all.truncate(k);
        all
    }

    #[test]
    fn finds_the_single_nearest_vector() {
        let vectors = vec![
            v(&[("x", 1.0)]),
            v(&[("x", 1.0), ("y", 0.2)]),
            v(&[("y", 1.0)]),
        ];
        let tree = KdTree::build(vectors.clone());
        let hits = tree.nearest_neighbors(&v(&[("x", 2.0)]), 1, Metric::Euclidean);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, 0);
    }

    #[test]
    fn excludes_an_exact_self_match() {
        let vectors = vec![v(&[("x", 1.0)]), v(&[("y", 1.0)])];
        let tree = KdTree::build(vectors.clone());
        let hits = tree.nearest_neighbors(&vectors[0], 2, Metric::Euclidean);
        assert!(hits.iter().all(|&(_, h)| h != 0));
    }

    #[test]
    fn matches_brute_force_on_random_sparse_vectors() {
        let mut rng = StdRng::seed_from_u64(42);
        let features = ["a", "b", "c", "d", "e", "f"];
        for _ in 0..25 {
            let n = rng.random_range(4..24);
            let vectors: Vec<Vector> = (0..n)
                .map(|_| {
                    Vector::new(features.iter().filter_map(|&f| {
                        rng.random_bool(0.5)
                            .then(|| (f, (rng.random_range(1..100) as f64) / 10.0))
                    }))
                })
                .collect();
            let target = Vector::new(
                features
                    .iter()
                    .map(|&f| (f, (rng.random_range(0..100) as f64) / 10.0)),
            );
            let k = rng.random_range(1..6);
            for metric in [Metric::Euclidean, Metric::Manhattan] {
                let tree = KdTree::build(vectors.clone());
                let hits = tree.nearest_neighbors(&target, k, metric);
                let expected = brute_force(&vectors, &target, k, metric);
                let got: Vec<f64> = hits.iter().map(|&(d, _)| d).collect();
                let want: Vec<f64> = expected.iter().map(|&(d, _)| d).collect();
                assert_eq!(got, want, "metric {metric:?}");
            }
        }
    }

    #[test]
    fn empty_tree_returns_no_hits() {
        let tree = KdTree::build(Vec::new());
        assert!(tree
            .nearest_neighbors(&v(&[("x", 1.0)]), 3, Metric::Cosine)
            .is_empty());
    }
}
