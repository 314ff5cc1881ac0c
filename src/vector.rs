//! Sparse document vectors.

use std::sync::OnceLock;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the weights of a [`Vector`] were derived. Vectors of different kinds
/// cannot be combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weight {
    Tf,
    TfIdf,
}

impl Weight {
    pub fn as_str(self) -> &'static str {
        match self {
            Weight::Tf => "tf",
            Weight::TfIdf => "tf-idf",
        }
    }
}

impl Default for Weight {
    fn default() -> Self {
        Weight::TfIdf
    }
}

/// A sparse mapping from feature (term or concept id) to a non-negative
/// weight, immutable after construction. The L2 norm is computed on first
/// access and cached; since the mapping cannot change, the cache is never
/// stale. "Mutation" means building a new `Vector`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vector {
    weights: IndexMap<Box<str>, f64>,
    weight: Weight,
    #[serde(skip)]
    norm: OnceLock<f64>,
}

impl PartialEq for Vector {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight && self.weights == other.weights
    }
}

impl Vector {
    /// Builds a tf-idf tagged vector from (feature, weight) pairs.
    pub fn new<K, I>(pairs: I) -> Self
    where
        K: Into<Box<str>>,
        I: IntoIterator<Item = (K, f64)>,
    {
        Self::with_weight(Weight::TfIdf, pairs)
    }

    /// Builds a vector carrying the given weight kind.
    pub fn with_weight<K, I>(weight: Weight, pairs: I) -> Self
    where
        K: Into<Box<str>>,
        I: IntoIterator<Item = (K, f64)>,
    {
        Vector {
            weights: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            weight,
            norm: OnceLock::new(),
        }
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    /// The weight of a feature, or `default` if absent.
    pub fn get(&self, feature: &str, default: f64) -> f64 {
        self.weights.get(feature).copied().unwrap_or(default)
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.weights.contains_key(feature)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// (feature, weight) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, &v)| (k.as_ref(), v))
    }

    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(AsRef::as_ref)
    }

    /// L2 (Frobenius) norm: sqrt of the sum of squared weights. Memoized.
    pub fn norm(&self) -> f64 {
        *self
            .norm
            .get_or_init(|| self.weights.values().map(|v| v * v).sum::<f64>().sqrt())
    }

    /// Dot product over the intersection of nonzero features.
    pub fn dot(&self, other: &Vector) -> f64 {
        // Iterate the smaller vector, look up in the larger one.
        let (a, b) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        a.iter().map(|(w, f)| b.get(w, 0.0) * f).sum()
    }

    /// Returns a copy of this vector with the weights of features *already
    /// present here* overwritten by `other`'s values. Features that only
    /// appear in `other` are ignored, so the dimension never grows.
    ///
    /// Fails with [`Error::WeightMismatch`] when the two vectors carry
    /// different weight kinds.
    pub fn apply(&self, other: &Vector) -> Result<Vector> {
        if self.weight != other.weight {
            return Err(Error::WeightMismatch(
                self.weight.as_str(),
                other.weight.as_str(),
            ));
        }
        let mut weights = self.weights.clone();
        for (k, v) in weights.iter_mut() {
            if let Some(&w) = other.weights.get(k) {
                *v = w;
            }
        }
        Ok(Vector {
            weights,
            weight: self.weight,
            norm: OnceLock::new(),
        })
    }

    /// The `top` features ranked by normalized weight (weights are scaled to
    /// sum to 1), ties broken by lexical order of the feature.
    pub fn keywords(&self, top: usize) -> Vec<(f64, String)> {
        let total: f64 = self.weights.values().sum();
        let total = if total != 0.0 { total } else { 1.0 };
        let mut ranked: Vec<(f64, String)> = self
            .weights
            .iter()
            .map(|(k, &v)| (v / total, k.to_string()))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        ranked.truncate(top);
        ranked
    }
}

impl<K: Into<Box<str>>> FromIterator<(K, f64)> for Vector {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Vector::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(pairs: &[(&str, f64)]) -> Vector {
        Vector::new(pairs.iter().map(|&(k, w)| (k, w)))
    }

    #[test]
    fn norm_is_l2() {
        let a = v(&[("x", 3.0), ("y", 4.0)]);
        assert_eq!(a.norm(), 5.0);
        // Memoized value survives repeated calls.
        assert_eq!(a.norm(), 5.0);
    }

    #[test]
    fn get_falls_back_to_default() {
        let a = v(&[("x", 0.5)]);
        assert_eq!(a.get("x", 0.0), 0.5);
        assert_eq!(a.get("missing", 7.0), 7.0);
    }

    #[test]
    fn apply_overwrites_only_shared_features() {
        let a = v(&[("x", 1.0), ("y", 2.0)]);
        let b = v(&[("y", 9.0), ("z", 5.0)]);
        let c = a.apply(&b).unwrap();
        assert_eq!(c.get("x", 0.0), 1.0);
        assert_eq!(c.get("y", 0.0), 9.0);
        assert!(!c.contains("z"));
    }

    #[test]
    fn apply_rejects_mixed_weights() {
        let a = Vector::with_weight(Weight::Tf, [("x", 1.0)]);
        let b = Vector::with_weight(Weight::TfIdf, [("x", 1.0)]);
        assert!(matches!(a.apply(&b), Err(Error::WeightMismatch(_, _))));
    }

    #[test]
    fn keywords_normalize_and_break_ties_lexically() {
        let a = v(&[("b", 2.0), ("a", 2.0), ("c", 4.0)]);
        let k = a.keywords(2);
        assert_eq!(k[0].1, "c");
        assert!((k[0].0 - 0.5).abs() < 1e-12);
        assert_eq!(k[1].1, "a");
    }

    #[test]
    fn dot_uses_feature_intersection() {
        let a = v(&[("x", 2.0), ("y", 1.0)]);
        let b = v(&[("y", 3.0), ("z", 10.0)]);
        assert_eq!(a.dot(&b), 3.0);
        assert_eq!(b.dot(&a), 3.0);
    }
}
