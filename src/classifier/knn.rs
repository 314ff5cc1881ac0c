//! k-nearest-neighbor classification with inverse-distance weighted voting.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::{Classifier, Sample};
use crate::distance::{self, Metric};
use crate::error::Result;
use crate::vector::Vector;

/// Lazy learner: training stores the labeled vectors, classification votes
/// among the k nearest under the configured metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestNeighbor {
    k: usize,
    metric: Metric,
    samples: Vec<(String, Vector)>,
}

impl Default for NearestNeighbor {
    fn default() -> Self {
        Self::new(10, Metric::Cosine)
    }
}

impl NearestNeighbor {
    pub fn new(k: usize, metric: Metric) -> Self {
        Self {
            k,
            metric,
            samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Persists the stored training samples.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = fs::File::create(path)?;
        serde_cbor::to_writer(file, self)?;
        Ok(())
    }

    /// Loads a model written by [`NearestNeighbor::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = fs::File::open(path)?;
        Ok(serde_cbor::from_reader(file)?)
    }
}

impl Classifier for NearestNeighbor {
    fn train(&mut self, sample: Sample<'_>, label: Option<&str>) {
        let (own, vector) = sample.vectorize();
        let Some(label) = label.map(str::to_owned).or(own) else {
            return;
        };
        self.samples.push((label, vector));
    }

    fn classify(&self, sample: Sample<'_>) -> Option<String> {
        let (_, vector) = sample.vectorize();
        let mut neighbors: Vec<(f64, &str)> = self
            .samples
            .iter()
            .map(|(label, v)| (distance::distance(&vector, v, self.metric), label.as_str()))
            .filter(|&(d, _)| d < 1.0)
            .collect();
        neighbors.sort_by(|a, b| a.0.total_cmp(&b.0));
        neighbors.truncate(self.k);

        // Votes are weighted by inverse distance, so an exact match drowns
        // out everything else.
        let mut votes: IndexMap<&str, f64> = IndexMap::new();
        for (d, label) in neighbors {
            *votes.entry(label).or_insert(0.0) += 1.0 / d.max(1e-10);
        }
        let top = votes.values().fold(0.0f64, |a, &b| a.max(b));
        let winners: Vec<&str> = votes
            .iter()
            .filter(|&(_, &w)| w == top)
            .map(|(&label, _)| label)
            .collect();
        winners
            .choose(&mut rand::rng())
            .map(|&label| label.to_owned())
    }

    fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> =
            self.samples.iter().map(|(label, _)| label.clone()).collect();
        classes.sort_unstable();
        classes.dedup();
        classes
    }

    fn features(&self) -> Vec<String> {
        let vectors: Vec<&Vector> = self.samples.iter().map(|(_, v)| v).collect();
        distance::feature_union(&vectors)
            .into_iter()
            .map(|f| f.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained() -> NearestNeighbor {
        let mut knn = NearestNeighbor::new(3, Metric::Cosine);
        knn.train(Sample::Tokens(&["wings", "fly", "feathers"]), Some("bird"));
        knn.train(Sample::Tokens(&["wings", "beak", "feathers"]), Some("bird"));
        knn.train(Sample::Tokens(&["purr", "fur", "whiskers"]), Some("cat"));
        knn.train(Sample::Tokens(&["fur", "claws", "whiskers"]), Some("cat"));
        knn
    }

    #[test]
    fn nearest_labels_win_the_vote() {
        let knn = trained();
        assert_eq!(
            knn.classify(Sample::Tokens(&["feathers", "wings"])).as_deref(),
            Some("bird")
        );
        assert_eq!(
            knn.classify(Sample::Tokens(&["whiskers", "fur"])).as_deref(),
            Some("cat")
        );
    }

    #[test]
    fn orthogonal_samples_have_no_neighbors() {
        let knn = trained();
        // Cosine distance to every stored vector is exactly 1, which is
        // outside the neighborhood.
        assert_eq!(knn.classify(Sample::Tokens(&["engine", "piston"])), None);
    }

    #[test]
    fn untrained_classifier_returns_none() {
        let knn = NearestNeighbor::default();
        assert_eq!(knn.classify(Sample::Tokens(&["wings"])), None);
    }

    #[test]
    fn trained_model_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knn.cbor");
        let knn = trained();
        knn.save(&path).unwrap();
        let loaded = NearestNeighbor::load(&path).unwrap();
        assert_eq!(loaded.len(), knn.len());
        assert_eq!(
            loaded.classify(Sample::Tokens(&["feathers", "wings"])).as_deref(),
            Some("bird")
        );
    }

    #[test]
    fn classes_are_deduplicated() {
        let knn = trained();
        assert_eq!(knn.classes(), vec!["bird".to_owned(), "cat".to_owned()]);
    }
}
