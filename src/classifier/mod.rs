//! Supervised classification: a common train/classify contract with Naive
//! Bayes and k-nearest-neighbor strategies, plus a test harness for holdout
//! and k-fold evaluation.

pub mod knn;
pub mod naive_bayes;

pub use knn::NearestNeighbor;
pub use naive_bayes::NaiveBayes;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::document::Document;
use crate::tokenize::{self, TokenizeOptions};
use crate::vector::{Vector, Weight};

/// Input accepted for training and classification, one variant per shape.
#[derive(Clone, Copy)]
pub enum Sample<'a> {
    /// A document; its tf vector and label are used. Documents trained from
    /// an LSA-reduced corpus should be passed as [`Sample::Vector`] with
    /// their concept vector instead.
    Document(&'a Document),
    /// Bare tokens, each weighted 1.
    Tokens(&'a [&'a str]),
    /// A (term, count) mapping; counts become weights.
    Counts(&'a IndexMap<Box<str>, u32>),
    /// Raw text, counted without stemming or stop word removal.
    Text(&'a str),
    Vector(&'a Vector),
}

impl<'a> Sample<'a> {
    /// Resolves the sample to a (label, vector) pair.
    pub fn vectorize(&self) -> (Option<String>, Vector) {
        match *self {
            Sample::Document(d) => (d.label().map(str::to_owned), d.tf_vector().clone()),
            Sample::Tokens(tokens) => (
                None,
                Vector::with_weight(Weight::Tf, tokens.iter().map(|&t| (t, 1.0))),
            ),
            Sample::Counts(counts) => (
                None,
                Vector::with_weight(
                    Weight::Tf,
                    counts.iter().map(|(t, &n)| (t.clone(), n as f64)),
                ),
            ),
            Sample::Text(text) => {
                let opts = TokenizeOptions {
                    keep_stopwords: true,
                    ..TokenizeOptions::default()
                };
                let words = tokenize::words(text, &opts);
                let counts = tokenize::count(&words, &opts);
                (
                    None,
                    Vector::with_weight(
                        Weight::Tf,
                        counts.into_iter().map(|(w, n)| (w, n as f64)),
                    ),
                )
            }
            Sample::Vector(v) => (None, v.clone()),
        }
    }
}

/// The train/classify/evaluate contract shared by every strategy.
pub trait Classifier {
    /// Trains on one sample. The explicit label wins over a document's own
    /// label; samples with no label at all are skipped.
    fn train(&mut self, sample: Sample<'_>, label: Option<&str>);

    /// The predicted class label, or `None` when nothing was trained.
    fn classify(&self, sample: Sample<'_>) -> Option<String>;

    /// Known class labels.
    fn classes(&self) -> Vec<String>;

    /// Known feature names.
    fn features(&self) -> Vec<String>;

    /// A classifier is binary when its labels are exactly {"0", "1"} or
    /// {"false", "true"}.
    fn is_binary(&self) -> bool {
        let mut classes = self.classes();
        classes.sort_unstable();
        classes == ["0", "1"] || classes == ["false", "true"]
    }
}

/// Scores from [`evaluate`]. Precision, recall and F1 are only measured for
/// binary classifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub accuracy: f64,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
}

/// Evaluates a classifier over labeled samples, either with a single
/// holdout split (`folds <= 1`; `holdout` is the training fraction) or with
/// k-fold cross-validation. The data is shuffled once up front so folds are
/// not sorted by class.
pub fn evaluate<C, F>(
    mut factory: F,
    data: &[(Sample<'_>, &str)],
    holdout: f64,
    folds: usize,
    seed: Option<u64>,
) -> Evaluation
where
    C: Classifier,
    F: FnMut() -> C,
{
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let mut shuffled: Vec<&(Sample<'_>, &str)> = data.iter().collect();
    shuffled.shuffle(&mut rng);

    let mut labels: Vec<&str> = data.iter().map(|&(_, label)| label).collect();
    labels.sort_unstable();
    labels.dedup();
    let binary = labels == ["0", "1"] || labels == ["false", "true"];

    let k = folds.max(1);
    let mut accuracy = 0.0;
    let mut precision = 0.0;
    let mut recall = 0.0;
    for fold in 0..k {
        let t = shuffled.len() as f64 / k as f64;
        let (start, stop) = if k == 1 {
            ((shuffled.len() as f64 * holdout) as usize, shuffled.len())
        } else {
            (
                (fold as f64 * t).round() as usize,
                (fold as f64 * t + t).round() as usize,
            )
        };
        let mut classifier = factory();
        for (i, (sample, label)) in shuffled.iter().enumerate() {
            if i < start || i >= stop {
                classifier.train(*sample, Some(*label));
            }
        }
        let tested = (stop - start).max(1) as f64;
        if binary {
            let truthy = |label: &str| label == "1" || label == "true";
            let (mut tp, mut tn, mut fp, mut fn_) = (0u32, 0u32, 0u32, 0u32);
            for (sample, label) in shuffled[start..stop].iter() {
                let actual = truthy(label);
                let predicted = classifier
                    .classify(*sample)
                    .map(|l| truthy(&l))
                    .unwrap_or(false);
                match (actual, predicted) {
                    (true, true) => tp += 1,
                    (false, false) => tn += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                }
            }
            accuracy += (tp + tn) as f64 / tested;
            precision += tp as f64 / (tp + fp).max(1) as f64;
            recall += tp as f64 / (tp + fn_).max(1) as f64;
        } else {
            let correct = shuffled[start..stop]
                .iter()
                .filter(|(sample, label)| {
                    classifier.classify(*sample).as_deref() == Some(*label)
                })
                .count();
            accuracy += correct as f64 / tested;
        }
    }
    let accuracy = accuracy / k as f64;
    if binary {
        let precision = precision / k as f64;
        let recall = recall / k as f64;
        let denominator = precision + recall;
        let f1 = if denominator != 0.0 {
            2.0 * precision * recall / denominator
        } else {
            0.0
        };
        Evaluation {
            accuracy,
            precision: Some(precision),
            recall: Some(recall),
            f1: Some(f1),
        }
    } else {
        Evaluation {
            accuracy,
            precision: None,
            recall: None,
            f1: None,
        }
    }
}
