//! Latent semantic analysis: singular value decomposition of the
//! document-term matrix, grouping related terms into concepts.
//!
//! Documents get a concept vector that approximates their original vector
//! with far fewer dimensions, so cosine similarity and clustering run faster
//! on large corpora.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::document::DocId;
use crate::error::{Error, Result};
use crate::vector::Vector;

/// How many concept dimensions to retain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rank {
    /// Retain exactly this many dimensions.
    Fixed(usize),
    /// Drop `round(|sigma|)` of the smallest singular values and retain the
    /// rest. A reasonable default when the right rank is unknown.
    Norm,
    /// Retain at most this many dimensions.
    Top(usize),
    /// Compute the retained rank from the full list of singular values.
    Custom(fn(&[f64]) -> usize),
}

impl Default for Rank {
    fn default() -> Self {
        Rank::Norm
    }
}

impl Rank {
    fn resolve(self, sigma: &[f64]) -> usize {
        match self {
            Rank::Fixed(k) => k,
            Rank::Norm => {
                let norm = sigma.iter().map(|s| s * s).sum::<f64>().sqrt();
                sigma.len().saturating_sub(norm.round() as usize)
            }
            Rank::Top(n) => n.min(sigma.len()),
            Rank::Custom(f) => f(sigma),
        }
    }
}

/// The truncated decomposition. Concept features are named `#0`, `#1`, ...
/// in order of decreasing singular value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lsa {
    /// Term column order of the factored matrix.
    terms: Vec<Box<str>>,
    /// Retained singular values, largest first.
    sigma: Vec<f64>,
    /// Concept rows over term columns.
    vt: Vec<Vec<f64>>,
    /// Concept vector per factored document.
    u: IndexMap<DocId, Vector>,
    /// Concept vectors of out-of-corpus documents, filled by [`Lsa::transform`].
    /// Rebuilt on demand, so it is not persisted.
    #[serde(skip)]
    cache: RefCell<HashMap<DocId, Rc<Vector>>>,
}

impl Lsa {
    /// Factors the document-term matrix and truncates it to the resolved
    /// rank. The retained rank must be at least 1 and smaller than the
    /// number of documents.
    pub fn fit(
        documents: &[(DocId, &Vector)],
        terms: Vec<Box<str>>,
        rank: Rank,
    ) -> Result<Self> {
        if documents.is_empty() || terms.is_empty() {
            return Err(Error::Dimension {
                rank: match rank {
                    Rank::Fixed(k) => k,
                    _ => 0,
                },
                documents: documents.len(),
            });
        }
        let matrix = DMatrix::from_fn(documents.len(), terms.len(), |i, j| {
            documents[i].1.get(&terms[j], 0.0)
        });
        let mut svd = matrix
            .try_svd(true, true, f64::EPSILON, 0)
            .ok_or(Error::Svd)?;
        svd.sort_by_singular_values();
        let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
            return Err(Error::Svd);
        };
        let sigma: Vec<f64> = svd.singular_values.iter().copied().collect();
        let k = rank.resolve(&sigma);
        if k == 0 || k >= documents.len() {
            return Err(Error::Dimension {
                rank: k,
                documents: documents.len(),
            });
        }
        let k = k.min(sigma.len());
        let u = documents
            .iter()
            .enumerate()
            .map(|(i, &(id, _))| {
                let row = Vector::new((0..k).map(|j| (format!("#{j}"), u[(i, j)])));
                (id, row)
            })
            .collect();
        Ok(Self {
            terms,
            sigma: sigma[..k].to_vec(),
            vt: (0..k)
                .map(|i| v_t.row(i).iter().copied().collect())
                .collect(),
            u,
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// Number of retained concept dimensions.
    pub fn rank(&self) -> usize {
        self.sigma.len()
    }

    pub fn terms(&self) -> &[Box<str>] {
        &self.terms
    }

    pub fn singular_values(&self) -> &[f64] {
        &self.sigma
    }

    /// Each concept as a (term, weight) mapping.
    pub fn concepts(&self) -> Vec<IndexMap<Box<str>, f64>> {
        self.vt
            .iter()
            .map(|row| self.terms.iter().cloned().zip(row.iter().copied()).collect())
            .collect()
    }

    /// The concept vector of a factored document.
    pub fn vector(&self, document: DocId) -> Option<&Vector> {
        self.u.get(&document)
    }

    pub fn contains(&self, document: DocId) -> bool {
        self.u.contains_key(&document)
    }

    pub fn len(&self) -> usize {
        self.u.len()
    }

    pub fn is_empty(&self) -> bool {
        self.u.is_empty()
    }

    /// Folds a document that was not part of the factored matrix into
    /// concept space: `sigma^-1 * vt * x`, with `x` the document's weights
    /// over the factored terms. Results are cached per document id.
    pub fn transform(&self, document: DocId, vector: &Vector) -> Rc<Vector> {
        if let Some(v) = self.u.get(&document) {
            return Rc::new(v.clone());
        }
        if let Some(v) = self.cache.borrow().get(&document) {
            return Rc::clone(v);
        }
        let x: Vec<f64> = self.terms.iter().map(|t| vector.get(t, 0.0)).collect();
        let concept = Vector::new(self.vt.iter().zip(&self.sigma).enumerate().map(
            |(i, (row, s))| {
                let dot: f64 = row.iter().zip(&x).map(|(a, b)| a * b).sum();
                (format!("#{i}"), if *s != 0.0 { dot / s } else { 0.0 })
            },
        ));
        let concept = Rc::new(concept);
        self.cache
            .borrow_mut()
            .insert(document, Rc::clone(&concept));
        concept
    }
}
