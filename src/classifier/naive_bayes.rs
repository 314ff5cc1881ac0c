//! Multinomial Naive Bayes over weighted feature vectors.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{Classifier, Sample};
use crate::error::Result;

/// Naive Bayes classifier. Feature weights are accumulated per class, and
/// classification scores each class by the product of its prior and the
/// per-feature likelihoods.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NaiveBayes {
    /// Key features by their position in the sample rather than position 0,
    /// for inputs where order is meaningful.
    aligned: bool,
    /// Samples seen per class, in first-seen order.
    classes: IndexMap<String, u64>,
    /// Accumulated weight per (class, feature, position).
    weights: HashMap<(String, Box<str>, usize), f64>,
    trained: u64,
}

impl NaiveBayes {
    pub fn new() -> Self {
        Self::default()
    }

    /// An aligned classifier distinguishes the same feature at different
    /// positions in the input.
    pub fn aligned() -> Self {
        Self {
            aligned: true,
            ..Self::default()
        }
    }

    fn position(&self, i: usize) -> usize {
        if self.aligned {
            i
        } else {
            0
        }
    }

    /// Persists the trained model.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = fs::File::create(path)?;
        serde_cbor::to_writer(file, self)?;
        Ok(())
    }

    /// Loads a model written by [`NaiveBayes::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = fs::File::open(path)?;
        Ok(serde_cbor::from_reader(file)?)
    }
}

impl Classifier for NaiveBayes {
    fn train(&mut self, sample: Sample<'_>, label: Option<&str>) {
        let (own, vector) = sample.vectorize();
        let Some(label) = label.map(str::to_owned).or(own) else {
            return;
        };
        for (i, (feature, weight)) in vector.iter().enumerate() {
            let key = (label.clone(), feature.into(), self.position(i));
            *self.weights.entry(key).or_insert(0.0) += weight;
        }
        *self.classes.entry(label).or_insert(0) += 1;
        self.trained += 1;
    }

    fn classify(&self, sample: Sample<'_>) -> Option<String> {
        if self.trained == 0 {
            return None;
        }
        let (_, vector) = sample.vectorize();
        let mut best: Option<(f64, &str)> = None;
        for (class, &seen) in &self.classes {
            let mut g = seen as f64 / self.trained as f64;
            for (i, (feature, weight)) in vector.iter().enumerate() {
                let key = (class.clone(), feature.into(), self.position(i));
                let sum = self.weights.get(&key).copied().unwrap_or(0.0);
                g = g / seen as f64 * sum * weight;
            }
            if best.map_or(true, |(score, _)| g > score) {
                best = Some((g, class));
            }
        }
        best.map(|(_, class)| class.to_owned())
    }

    fn classes(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }

    fn features(&self) -> Vec<String> {
        let mut features: Vec<String> = self
            .weights
            .keys()
            .map(|(_, feature, _)| feature.to_string())
            .collect();
        features.sort_unstable();
        features.dedup();
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained() -> NaiveBayes {
        let mut nb = NaiveBayes::new();
        nb.train(Sample::Tokens(&["wings", "fly", "feathers"]), Some("bird"));
        nb.train(Sample::Tokens(&["wings", "beak"]), Some("bird"));
        nb.train(Sample::Tokens(&["purr", "fur", "whiskers"]), Some("cat"));
        nb.train(Sample::Tokens(&["fur", "claws"]), Some("cat"));
        nb
    }

    #[test]
    fn classifies_by_feature_overlap() {
        let nb = trained();
        let predicted = nb.classify(Sample::Tokens(&["fly", "wings"]));
        assert_eq!(predicted.as_deref(), Some("bird"));
        let predicted = nb.classify(Sample::Tokens(&["fur", "purr"]));
        assert_eq!(predicted.as_deref(), Some("cat"));
    }

    #[test]
    fn untrained_classifier_returns_none() {
        let nb = NaiveBayes::new();
        assert_eq!(nb.classify(Sample::Tokens(&["wings"])), None);
    }

    #[test]
    fn disjoint_features_score_zero_for_the_wrong_class() {
        let nb = trained();
        // No bird feature appears in the sample, so the bird discriminant
        // collapses to zero and cat wins outright.
        let predicted = nb.classify(Sample::Tokens(&["claws", "whiskers"]));
        assert_eq!(predicted.as_deref(), Some("cat"));
    }

    #[test]
    fn unlabeled_samples_are_skipped() {
        let mut nb = NaiveBayes::new();
        nb.train(Sample::Tokens(&["wings"]), None);
        assert_eq!(nb.classes(), Vec::<String>::new());
    }

    #[test]
    fn document_label_is_used_when_no_override_is_given() {
        use crate::document::Document;
        use crate::tokenize::TokenizeOptions;
        let mut nb = NaiveBayes::new();
        let d = Document::from_text("feathers and wings", &TokenizeOptions::default())
            .with_label("bird");
        nb.train(Sample::Document(&d), None);
        assert_eq!(nb.classes(), vec!["bird".to_owned()]);
    }

    #[test]
    fn trained_model_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bayes.cbor");
        let nb = trained();
        nb.save(&path).unwrap();
        let loaded = NaiveBayes::load(&path).unwrap();
        assert_eq!(loaded.classes(), nb.classes());
        assert_eq!(loaded.features(), nb.features());
        assert_eq!(
            loaded.classify(Sample::Tokens(&["fly", "wings"])).as_deref(),
            Some("bird")
        );
    }

    #[test]
    fn aligned_mode_distinguishes_positions() {
        let mut nb = NaiveBayes::aligned();
        nb.train(Sample::Tokens(&["a", "b"]), Some("ab"));
        nb.train(Sample::Tokens(&["b", "a"]), Some("ba"));
        assert_eq!(nb.classify(Sample::Tokens(&["a", "b"])).as_deref(), Some("ab"));
        assert_eq!(nb.classify(Sample::Tokens(&["b", "a"])).as_deref(), Some("ba"));
    }
}
