//! Vector-space text retrieval and machine learning.
//!
//! Documents become weighted term vectors; a corpus compares, searches,
//! clusters and classifies them. The pipeline:
//!
//! 1. tokenize text into counted terms ([`tokenize`], [`Document`])
//! 2. weight terms by tf or tf-idf against a [`Corpus`]
//! 3. compare vectors by cosine, Euclidean, Manhattan or Hamming distance
//! 4. group with k-means / k-means++ or hierarchical clustering, index with
//!    a k-d tree, classify with Naive Bayes or k-nearest neighbors
//! 5. optionally reduce dimensionality with latent semantic analysis
//!
//! A [`Corpus`] and its caches belong to one thread. Heavy grid
//! computations (feature selection, k-means reassignment) fan out
//! internally through `rayon`.

pub mod classifier;
pub mod cluster;
pub mod corpus;
pub mod distance;
pub mod document;
pub mod error;
pub mod kdtree;
pub mod lsa;
pub mod tokenize;
pub mod vector;

/// Sparse feature vector with a cached L2 norm and a tf / tf-idf kind tag.
/// Immutable once built; deriving a changed vector means building a new one.
pub use vector::{Vector, Weight};

/// Bag of counted terms with an optional name and class label. A document
/// belongs to at most one corpus, which owns it and its weighted vector.
pub use document::{DocId, Document, DocumentInput};

/// Ordered document collection: tf-idf weighting, cached cosine similarity,
/// retrieval, clustering, feature selection, LSA reduction and persistence.
pub use corpus::{Corpus, ExportFormat};

/// Distance metrics over sparse vectors.
pub use distance::{distance, Metric};

/// k-means (with optional k-means++ seeding and relaxed triangle-inequality
/// pruning) and agglomerative hierarchical clustering.
pub use cluster::{hierarchical, k_means, Cluster, KMeansOptions, Seeding};

/// Balanced k-d tree for exact nearest-neighbor queries.
pub use kdtree::KdTree;

/// Train/classify contract with Naive Bayes and k-nearest-neighbor
/// implementations, plus holdout and k-fold evaluation.
pub use classifier::{evaluate, Classifier, Evaluation, NaiveBayes, NearestNeighbor, Sample};

/// Latent semantic analysis over the document-term matrix.
pub use lsa::{Lsa, Rank};

/// Word splitting, stop words and term counting.
pub use tokenize::{count, words, TokenizeOptions};

pub use error::{Error, Result};
