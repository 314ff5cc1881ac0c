//! Distance measures between sparse vectors.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::vector::{Vector, Weight};

/// Distance measures supported by clustering, the k-d tree and kNN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// 1 - cosine similarity. A semimetric: the triangle inequality only
    /// holds approximately.
    Cosine,
    /// Squared Euclidean distance over the feature union.
    Euclidean,
    Manhattan,
    /// Fraction of the feature union where the two vectors disagree,
    /// relative to the larger vector.
    Hamming,
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Cosine
    }
}

/// Distance between two sparse vectors under the given measure.
pub fn distance(v1: &Vector, v2: &Vector, metric: Metric) -> f64 {
    match metric {
        Metric::Cosine => {
            let denominator = v1.norm() * v2.norm();
            let denominator = if denominator != 0.0 { denominator } else { 1.0 };
            1.0 - v1.dot(v2) / denominator
        }
        Metric::Euclidean => feature_union(&[v1, v2])
            .iter()
            .map(|w| {
                let d = v1.get(w, 0.0) - v2.get(w, 0.0);
                d * d
            })
            .sum(),
        Metric::Manhattan => feature_union(&[v1, v2])
            .iter()
            .map(|w| (v1.get(w, 0.0) - v2.get(w, 0.0)).abs())
            .sum(),
        Metric::Hamming => {
            let union = feature_union(&[v1, v2]);
            let mismatched = union
                .iter()
                .filter(|w| {
                    !(v1.contains(w) && v2.contains(w) && v1.get(w, 0.0) == v2.get(w, 0.0))
                })
                .count();
            mismatched as f64 / v1.len().max(v2.len()).max(1) as f64
        }
    }
}

/// The set of unique features across all given vectors, in first-seen order.
pub fn feature_union(vectors: &[&Vector]) -> IndexSet<Box<str>> {
    vectors
        .iter()
        .flat_map(|v| v.features())
        .map(Box::from)
        .collect()
}

/// The coordinate-wise mean of the given vectors over the given feature set.
/// Features whose mean is exactly 0 are dropped, keeping the result sparse.
pub fn centroid<'a, K>(vectors: &[&Vector], keys: K) -> Vector
where
    K: IntoIterator<Item = &'a str>,
{
    let n = vectors.len().max(1) as f64;
    let weight = vectors.first().map_or(Weight::TfIdf, |v| v.weight());
    Vector::with_weight(
        weight,
        keys.into_iter().filter_map(|k| {
            let mean = vectors.iter().map(|v| v.get(k, 0.0)).sum::<f64>() / n;
            (mean != 0.0).then(|| (Box::from(k), mean))
        }),
    )
}
