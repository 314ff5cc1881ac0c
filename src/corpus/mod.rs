//! A corpus is an ordered collection of documents that can be compared,
//! searched, clustered and reduced.
//!
//! Term relevancy depends on every other document in the collection, so the
//! corpus owns its documents and all derived state: document frequencies,
//! weighted document vectors, pairwise similarity and divergence, and the
//! optional LSA concept space. Every structural change clears the lot.

mod export;

pub use export::ExportFormat;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cluster::{hierarchical, k_means, Cluster, KMeansOptions};
use crate::distance::Metric;
use crate::document::{DocId, Document};
use crate::error::{Error, Result};
use crate::lsa::{Lsa, Rank};
use crate::tokenize::TokenizeOptions;
use crate::vector::{Vector, Weight};

/// Corpus ids, like document ids, are process-unique.
static NEXT_CORPUS_ID: AtomicU64 = AtomicU64::new(1);

fn next_corpus_id() -> u64 {
    NEXT_CORPUS_ID.fetch_add(1, Ordering::Relaxed)
}

/// Weights below this are treated as absent in divergence calculations, so
/// `log2` stays finite.
const KLD_FLOOR: f64 = 1e-6;

/// An ordered document collection with corpus-wide term weighting.
///
/// Comparison caches are filled lazily and survive [`Corpus::save`]; the
/// caches that hold `Rc` handles are rebuilt on demand instead.
#[derive(Serialize, Deserialize)]
pub struct Corpus {
    #[serde(skip, default = "next_corpus_id")]
    id: u64,
    /// Free-form description of the dataset.
    pub description: String,
    weight: Weight,
    documents: Vec<Document>,
    index: HashMap<String, DocId>,
    /// Cosine similarity per unordered document id pair.
    similarity: RefCell<HashMap<(DocId, DocId), f64>>,
    /// Symmetric Kullback-Leibler divergence per unordered feature pair.
    divergence: RefCell<HashMap<(Box<str>, Box<str>), f64>>,
    lsa: Option<Lsa>,
    #[serde(skip)]
    df: RefCell<HashMap<Box<str>, f64>>,
    #[serde(skip)]
    vector: RefCell<Option<Rc<Vector>>>,
    #[serde(skip)]
    vectors: RefCell<HashMap<DocId, Rc<Vector>>>,
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new()
    }
}

impl Corpus {
    pub fn new() -> Self {
        Self::with_weight(Weight::TfIdf)
    }

    pub fn with_weight(weight: Weight) -> Self {
        Self {
            id: next_corpus_id(),
            description: String::new(),
            weight,
            documents: Vec::new(),
            index: HashMap::new(),
            similarity: RefCell::new(HashMap::new()),
            divergence: RefCell::new(HashMap::new()),
            lsa: None,
            df: RefCell::new(HashMap::new()),
            vector: RefCell::new(None),
            vectors: RefCell::new(HashMap::new()),
        }
    }

    pub fn from_documents(documents: Vec<Document>, weight: Weight) -> Self {
        let mut corpus = Self::with_weight(weight);
        corpus.extend(documents);
        corpus
    }

    /// Builds a corpus from a file glob (e.g. `"folder/*.txt"`). Each file
    /// becomes one document named after its file stem.
    pub fn build(pattern: &str, opts: &TokenizeOptions) -> Result<Self> {
        let mut documents = Vec::new();
        for entry in glob::glob(pattern)? {
            let path = entry.map_err(|e| Error::Io(e.into_error()))?;
            documents.push(Document::open(&path, opts)?);
        }
        Ok(Self::from_documents(documents, Weight::TfIdf))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }

    pub fn get(&self, i: usize) -> Option<&Document> {
        self.documents.get(i)
    }

    /// Looks a document up by name. Names are assumed unique per corpus.
    pub fn document(&self, name: &str) -> Option<&Document> {
        let id = *self.index.get(name)?;
        self.documents.iter().find(|d| d.id() == id)
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    /// Switches between tf and tf-idf weighting and clears every cache.
    pub fn set_weight(&mut self, weight: Weight) {
        self.weight = weight;
        self.invalidate();
    }

    /// Adds a document; the corpus becomes its owner.
    pub fn append(&mut self, document: Document) {
        self.push(document);
        self.invalidate();
    }

    pub fn extend(&mut self, documents: impl IntoIterator<Item = Document>) {
        for document in documents {
            self.push(document);
        }
        self.invalidate();
    }

    fn push(&mut self, mut document: Document) {
        document.corpus = Some(self.id);
        if let Some(name) = document.name() {
            self.index.insert(name.to_owned(), document.id());
        }
        self.documents.push(document);
    }

    /// Removes and returns a document, detached again.
    pub fn remove(&mut self, id: DocId) -> Option<Document> {
        let i = self.documents.iter().position(|d| d.id() == id)?;
        let mut document = self.documents.remove(i);
        document.corpus = None;
        if let Some(name) = document.name() {
            self.index.remove(name);
        }
        self.invalidate();
        Some(document)
    }

    /// Removes the document with the given name.
    pub fn remove_named(&mut self, name: &str) -> Result<Document> {
        let id = self
            .index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownDocument(name.to_owned()))?;
        // The index entry guarantees the document is present.
        self.remove(id)
            .ok_or_else(|| Error::UnknownDocument(name.to_owned()))
    }

    /// Removes every document and drops all derived state.
    pub fn clear(&mut self) {
        self.documents.clear();
        self.index.clear();
        self.invalidate();
    }

    /// Term relevancy changes with membership, so any structural change
    /// drops all derived state at once, including the LSA space.
    fn invalidate(&mut self) {
        self.df.borrow_mut().clear();
        self.similarity.borrow_mut().clear();
        self.divergence.borrow_mut().clear();
        *self.vector.borrow_mut() = None;
        self.vectors.borrow_mut().clear();
        self.lsa = None;
        tracing::debug!(documents = self.documents.len(), "corpus caches invalidated");
    }

    /// Fraction of documents containing the word, 0 when the corpus is
    /// empty. The whole frequency table is computed on first access.
    pub fn document_frequency(&self, word: &str) -> f64 {
        if self.documents.is_empty() {
            return 0.0;
        }
        if self.df.borrow().is_empty() {
            let mut df = self.df.borrow_mut();
            for document in &self.documents {
                for term in document.terms().keys() {
                    *df.entry(term.clone()).or_insert(0.0) += 1.0;
                }
            }
            let n = self.documents.len() as f64;
            for f in df.values_mut() {
                *f /= n;
            }
        }
        self.df.borrow().get(word).copied().unwrap_or(0.0)
    }

    /// `ln(1/df)`, or `None` for words that occur in no document. Words
    /// occurring everywhere get 0: frequent words carry no information.
    pub fn inverse_document_frequency(&self, word: &str) -> Option<f64> {
        let df = self.document_frequency(word);
        (df != 0.0).then(|| (1.0 / df).ln())
    }

    /// The corpus vector: every term in the corpus mapped to weight 0. Its
    /// keys are the dimension of the vector space.
    pub fn vector(&self) -> Rc<Vector> {
        if let Some(v) = self.vector.borrow().as_ref() {
            return Rc::clone(v);
        }
        let v = Rc::new(Vector::with_weight(
            self.weight,
            self.documents
                .iter()
                .flat_map(|d| d.terms().keys())
                .map(|w| (w.clone(), 0.0)),
        ));
        *self.vector.borrow_mut() = Some(Rc::clone(&v));
        v
    }

    /// All corpus terms, in first-seen order.
    pub fn features(&self) -> Vec<Box<str>> {
        self.vector().features().map(Box::from).collect()
    }

    /// Ratio of stored terms to the full document-term matrix size.
    pub fn density(&self) -> f64 {
        let terms = self.vector().len();
        if terms == 0 {
            return 0.0;
        }
        let stored: usize = self.documents.iter().map(|d| d.terms().len()).sum();
        stored as f64 / (terms * terms) as f64
    }

    /// The document's weighted term vector under the corpus weighting. With
    /// tf-idf, a word missing from the corpus falls back to its tf weight,
    /// so out-of-corpus query documents still get usable vectors.
    pub fn document_vector(&self, document: &Document) -> Rc<Vector> {
        if let Some(v) = self.vectors.borrow().get(&document.id()) {
            return Rc::clone(v);
        }
        let v = match self.weight {
            Weight::Tf => document.tf_vector().clone(),
            Weight::TfIdf => Vector::with_weight(
                Weight::TfIdf,
                document.terms().keys().map(|w| {
                    let tf = document.term_frequency(w);
                    let weight = match self.inverse_document_frequency(w) {
                        Some(idf) => tf * idf,
                        None => tf,
                    };
                    (w.clone(), weight)
                }),
            ),
        };
        let v = Rc::new(v);
        self.vectors.borrow_mut().insert(document.id(), Rc::clone(&v));
        v
    }

    /// The vector used for comparison: the concept vector when LSA is
    /// active, the weighted term vector otherwise.
    fn retrieval_vector(&self, document: &Document) -> Rc<Vector> {
        match &self.lsa {
            Some(lsa) => lsa.transform(document.id(), &self.document_vector(document)),
            None => self.document_vector(document),
        }
    }

    /// Cosine similarity between two documents, cached per unordered id
    /// pair. The documents need not belong to the corpus.
    pub fn cosine_similarity(&self, d1: &Document, d2: &Document) -> f64 {
        let key = id_pair(d1.id(), d2.id());
        if let Some(&s) = self.similarity.borrow().get(&key) {
            return s;
        }
        let v1 = self.retrieval_vector(d1);
        let v2 = self.retrieval_vector(d2);
        let norm = v1.norm() * v2.norm();
        let s = v1.dot(&v2) / if norm == 0.0 { 1.0 } else { norm };
        self.similarity.borrow_mut().insert(key, s);
        s
    }

    /// Distance between two document vectors under any metric, uncached.
    pub fn distance(&self, d1: &Document, d2: &Document, metric: Metric) -> f64 {
        crate::distance::distance(
            &self.retrieval_vector(d1),
            &self.retrieval_vector(d2),
            metric,
        )
    }

    /// Top keywords of a document under the corpus weighting.
    pub fn keywords(&self, document: &Document, top: usize) -> Vec<(f64, String)> {
        self.document_vector(document).keywords(top)
    }

    /// The documents most similar to the given one, as (similarity,
    /// document) pairs. The document itself and zero scores are dropped;
    /// ties break on document id.
    pub fn nearest_neighbors<'a>(
        &'a self,
        document: &Document,
        top: usize,
    ) -> Vec<(f64, &'a Document)> {
        let mut scored: Vec<(f64, &Document)> = self
            .documents
            .iter()
            .filter(|d| d.id() != document.id())
            .map(|d| (self.cosine_similarity(document, d), d))
            .filter(|&(w, _)| w > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id().cmp(&b.1.id())));
        scored.truncate(top);
        scored
    }

    /// Retrieves the documents most related to a bag of query words. Query
    /// words that never occur in the corpus match nothing.
    pub fn vector_space_search<'a>(
        &'a self,
        words: &[&str],
        opts: &TokenizeOptions,
        top: usize,
    ) -> Vec<(f64, &'a Document)> {
        let mut query = Document::from_tokens(words, opts);
        query.corpus = Some(self.id);
        let space = self.vector();
        if !query.terms().keys().any(|w| space.contains(w)) {
            return Vec::new();
        }
        self.nearest_neighbors(&query, top)
    }

    /// Groups the documents into k clusters.
    pub fn cluster_kmeans(&self, options: &KMeansOptions) -> Vec<Vec<&Document>> {
        let held: Vec<Rc<Vector>> =
            self.documents.iter().map(|d| self.retrieval_vector(d)).collect();
        let refs: Vec<&Vector> = held.iter().map(Rc::as_ref).collect();
        k_means(&refs, options)
            .into_iter()
            .map(|cluster| cluster.into_iter().map(|i| &self.documents[i]).collect())
            .collect()
    }

    /// Merges the documents bottom-up into a cluster tree. Leaf handles in
    /// the returned tree index into [`Corpus::documents`].
    pub fn cluster_hierarchical(
        &self,
        k: usize,
        iterations: usize,
        metric: Metric,
        seed: Option<u64>,
    ) -> Cluster {
        let held: Vec<Rc<Vector>> =
            self.documents.iter().map(|d| self.retrieval_vector(d)).collect();
        let refs: Vec<&Vector> = held.iter().map(Rc::as_ref).collect();
        hierarchical(&refs, k, iterations, metric, seed)
    }

    /// Resolves cluster leaf handles back to documents.
    pub fn leaf_documents(&self, cluster: &Cluster) -> Vec<&Document> {
        cluster.leaves().into_iter().map(|i| &self.documents[i]).collect()
    }

    /// Symmetric Kullback-Leibler divergence between two features, averaged
    /// over all document vectors and cached per unordered feature pair.
    /// Higher values mean more distinct features.
    pub fn kullback_leibler_divergence(&self, word1: &str, word2: &str) -> f64 {
        let key = feature_pair(word1, word2);
        if let Some(&d) = self.divergence.borrow().get(&key) {
            return d;
        }
        let held: Vec<Rc<Vector>> =
            self.documents.iter().map(|d| self.document_vector(d)).collect();
        let d = symmetric_kld(word1, word2, &held);
        self.divergence.borrow_mut().insert(key, d);
        d
    }

    /// The `top` most distinct features by summed pairwise divergence, a
    /// subset of [`Corpus::features`] suitable for training smaller
    /// classifiers. The O(features²) divergence grid runs in parallel.
    pub fn feature_selection(&self, top: usize) -> Vec<String> {
        let terms = self.features();
        let vectors: Vec<Vector> = self
            .documents
            .iter()
            .map(|d| (*self.document_vector(d)).clone())
            .collect();
        tracing::debug!(features = terms.len(), "scoring feature divergence");
        let grid: Vec<(usize, usize, f64)> = (0..terms.len())
            .into_par_iter()
            .flat_map_iter(|i| {
                let terms = &terms;
                let vectors = &vectors;
                (i + 1..terms.len())
                    .map(move |j| (i, j, symmetric_kld(&terms[i], &terms[j], vectors)))
            })
            .collect();
        let mut totals = vec![0.0; terms.len()];
        {
            let mut divergence = self.divergence.borrow_mut();
            for &(i, j, d) in &grid {
                totals[i] += d;
                totals[j] += d;
                divergence.insert(feature_pair(&terms[i], &terms[j]), d);
            }
        }
        let mut ranked: Vec<(f64, &Box<str>)> =
            totals.into_iter().zip(&terms).collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        ranked.truncate(top);
        ranked.into_iter().map(|(_, w)| w.to_string()).collect()
    }

    /// A new corpus whose documents keep only the given features, e.g. a
    /// subset from [`Corpus::feature_selection`].
    pub fn filter(&self, features: &[&str]) -> Corpus {
        let keep: HashSet<&str> = features.iter().copied().collect();
        let documents = self
            .documents
            .iter()
            .map(|d| {
                let terms: IndexMap<Box<str>, u32> = d
                    .terms()
                    .iter()
                    .filter(|(w, _)| keep.contains(w.as_ref()))
                    .map(|(w, &n)| (w.clone(), n))
                    .collect();
                let mut document = Document::from_counts(terms);
                if let Some(name) = d.name() {
                    document = document.with_name(name);
                }
                if let Some(label) = d.label() {
                    document = document.with_label(label);
                }
                document
            })
            .collect();
        Corpus::from_documents(documents, self.weight)
    }

    /// Builds LSA concept vectors, after which similarity, search and
    /// clustering run in the reduced concept space. Undone by
    /// [`Corpus::clear_lsa`] or any structural change.
    pub fn latent_semantic_analysis(&mut self, rank: Rank) -> Result<()> {
        let terms = self.features();
        let held: Vec<(DocId, Rc<Vector>)> = self
            .documents
            .iter()
            .map(|d| (d.id(), self.document_vector(d)))
            .collect();
        let rows: Vec<(DocId, &Vector)> =
            held.iter().map(|(id, v)| (*id, v.as_ref())).collect();
        tracing::debug!(documents = rows.len(), terms = terms.len(), "factoring corpus");
        self.lsa = Some(Lsa::fit(&rows, terms, rank)?);
        // Similarities measured in term space no longer apply.
        self.similarity.borrow_mut().clear();
        Ok(())
    }

    /// Alias for [`Corpus::latent_semantic_analysis`].
    pub fn reduce(&mut self, rank: Rank) -> Result<()> {
        self.latent_semantic_analysis(rank)
    }

    pub fn lsa(&self) -> Option<&Lsa> {
        self.lsa.as_ref()
    }

    /// Drops the concept space and returns to term-space comparison.
    pub fn clear_lsa(&mut self) {
        if self.lsa.take().is_some() {
            self.similarity.borrow_mut().clear();
        }
    }

    /// Persists the corpus, including its comparison caches. With `update`
    /// the full similarity matrix is computed first. Cached similarities
    /// involving transient query documents are pruned.
    pub fn save(&self, path: impl AsRef<Path>, update: bool) -> Result<()> {
        if update {
            for d1 in &self.documents {
                for d2 in &self.documents {
                    self.cosine_similarity(d1, d2);
                }
            }
        }
        let ids: HashSet<DocId> = self.documents.iter().map(|d| d.id()).collect();
        self.similarity
            .borrow_mut()
            .retain(|&(a, b), _| ids.contains(&a) && ids.contains(&b));
        let file = fs::File::create(path)?;
        serde_cbor::to_writer(file, self)?;
        Ok(())
    }

    /// Loads a corpus written by [`Corpus::save`]. The corpus gets a fresh
    /// id, its documents are re-bound to it, and the id source is moved past
    /// every loaded document id.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = fs::File::open(path)?;
        let mut corpus: Corpus = serde_cbor::from_reader(file)?;
        for document in &mut corpus.documents {
            document.corpus = Some(corpus.id);
            DocId::reserve(document.id());
        }
        Ok(corpus)
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

fn id_pair(a: DocId, b: DocId) -> (DocId, DocId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn feature_pair(a: &str, b: &str) -> (Box<str>, Box<str>) {
    if a <= b {
        (a.into(), b.into())
    } else {
        (b.into(), a.into())
    }
}

/// `(KL(w1 || w2) + KL(w2 || w1)) / 2` over the document vectors, with
/// absent weights floored so the logarithm stays finite.
fn symmetric_kld<V: std::borrow::Borrow<Vector>>(word1: &str, word2: &str, vectors: &[V]) -> f64 {
    let mut kl1 = 0.0;
    let mut kl2 = 0.0;
    for v in vectors {
        let v = v.borrow();
        if v.contains(word1) {
            let f = v.get(word1, 0.0);
            kl1 += f * (f.max(KLD_FLOOR).log2() - v.get(word2, 0.0).max(KLD_FLOOR).log2());
        }
        if v.contains(word2) {
            let f = v.get(word2, 0.0);
            kl2 += f * (f.max(KLD_FLOOR).log2() - v.get(word1, 0.0).max(KLD_FLOOR).log2());
        }
    }
    (kl1 + kl2) / 2.0
}
