//! Documents: immutable bags of counted terms.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tokenize::{self, TokenizeOptions};
use crate::vector::{Vector, Weight};

/// Monotonic document id source, shared by every corpus in the process.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

const BOM_UTF8: &[u8] = b"\xef\xbb\xbf";

/// Opaque document identifier, unique within the process.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DocId(pub(crate) u64);

impl DocId {
    fn next() -> Self {
        DocId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Moves the id source past `id`. Called when persisted documents are
    /// loaded, so fresh ids never collide with loaded ones.
    pub(crate) fn reserve(id: DocId) {
        NEXT_ID.fetch_max(id.0 + 1, Ordering::Relaxed);
    }
}

/// Input accepted by [`Document::new`], one variant per supported shape.
pub enum DocumentInput<'a> {
    /// Raw text, tokenized and filtered per the given options.
    Text(&'a str),
    /// Pre-tokenized words, counted per the given options.
    Tokens(&'a [&'a str]),
    /// A pre-built (term, count) mapping, taken as-is.
    Counts(IndexMap<Box<str>, u32>),
    /// An existing vector. A vector carries no count information, so every
    /// feature is recorded with count 1.
    Vector(&'a Vector),
}

/// An immutable set of (term, count) pairs with an optional name (corpus
/// lookup key) and an optional class label.
///
/// A document belongs to at most one [`Corpus`](crate::Corpus) at a time; the
/// corpus owns the document and the document keeps only the corpus id as a
/// non-owning handle.
#[derive(Debug, Serialize, Deserialize)]
pub struct Document {
    id: DocId,
    name: Option<String>,
    label: Option<String>,
    terms: IndexMap<Box<str>, u32>,
    /// Id of the owning corpus, if any.
    pub(crate) corpus: Option<u64>,
    #[serde(skip)]
    count: OnceLock<u64>,
    #[serde(skip)]
    tf_vec: OnceLock<Vector>,
}

impl Clone for Document {
    /// Copies name, label and terms into a fresh, detached document with its
    /// own id.
    fn clone(&self) -> Self {
        Document {
            id: DocId::next(),
            name: self.name.clone(),
            label: self.label.clone(),
            terms: self.terms.clone(),
            corpus: None,
            count: OnceLock::new(),
            tf_vec: OnceLock::new(),
        }
    }
}

impl Document {
    /// Builds a document from any supported input shape.
    pub fn new(input: DocumentInput<'_>, opts: &TokenizeOptions) -> Self {
        match input {
            DocumentInput::Text(s) => Self::from_text(s, opts),
            DocumentInput::Tokens(t) => Self::from_tokens(t, opts),
            DocumentInput::Counts(c) => Self::from_counts(c),
            DocumentInput::Vector(v) => Self::from_vector(v),
        }
    }

    /// Tokenizes, filters and counts the words of the given string.
    pub fn from_text(text: &str, opts: &TokenizeOptions) -> Self {
        let words = tokenize::words(text, opts);
        Self::from_counts(tokenize::count(&words, opts))
    }

    /// Counts a pre-tokenized word sequence.
    pub fn from_tokens<T: AsRef<str>>(tokens: &[T], opts: &TokenizeOptions) -> Self {
        Self::from_counts(tokenize::count(tokens, opts))
    }

    /// Wraps a pre-built (term, count) mapping.
    pub fn from_counts(terms: IndexMap<Box<str>, u32>) -> Self {
        Document {
            id: DocId::next(),
            name: None,
            label: None,
            terms,
            corpus: None,
            count: OnceLock::new(),
            tf_vec: OnceLock::new(),
        }
    }

    /// Adopts a vector's features. Counts are lost; the vector itself is
    /// kept as the document's term-frequency vector.
    pub fn from_vector(vector: &Vector) -> Self {
        let doc = Self::from_counts(vector.features().map(|f| (Box::from(f), 1)).collect());
        let _ = doc.tf_vec.set(vector.clone());
        doc
    }

    /// Reads a text file and builds a document from its content. The
    /// document is named after the file (stem only, underscores mapped to
    /// spaces).
    pub fn open(path: impl AsRef<Path>, opts: &TokenizeOptions) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let text = String::from_utf8(bytes)
            .map_err(|_| Error::TypeMismatch(format!("{} is not valid UTF-8", path.display())))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        Ok(Self::from_text(text, opts).with_name(stem(path)))
    }

    /// Reads a file produced by [`Document::save`]. The saved material is
    /// already canonical, so no filtering or stemming is applied.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let text = String::from_utf8(bytes)
            .map_err(|_| Error::TypeMismatch(format!("{} is not valid UTF-8", path.display())))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        let opts = TokenizeOptions::raw();
        let tokens: Vec<&str> = text.split(' ').filter(|w| !w.is_empty()).collect();
        Ok(Self::from_tokens(&tokens, &opts).with_name(stem(path)))
    }

    /// Writes the term multiset as a space-separated UTF-8 text file with a
    /// byte-order mark. Lossy with respect to the original casing and
    /// punctuation, exact with respect to term counts.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out: Vec<&str> = Vec::with_capacity(self.count() as usize);
        for (term, &n) in &self.terms {
            for _ in 0..n {
                out.push(term);
            }
        }
        let mut file = fs::File::create(path)?;
        file.write_all(BOM_UTF8)?;
        file.write_all(out.join(" ").as_bytes())?;
        Ok(())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn id(&self) -> DocId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The class label ("type") of the document, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// (term, count) pairs, immutable.
    pub fn terms(&self) -> &IndexMap<Box<str>, u32> {
        &self.terms
    }

    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(AsRef::as_ref)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    /// Whether this document currently belongs to a corpus.
    pub fn is_attached(&self) -> bool {
        self.corpus.is_some()
    }

    /// Adds `n` occurrences of a term. Only allowed while the document is
    /// still being built: once the term-frequency vector has been computed
    /// or the document has joined a corpus, the term mapping is frozen.
    pub fn add_term(&mut self, term: &str, n: u32) -> Result<()> {
        if self.corpus.is_some() {
            return Err(Error::ReadOnly("document belongs to a corpus"));
        }
        if self.tf_vec.get().is_some() {
            return Err(Error::ReadOnly("document vector already derived"));
        }
        *self.terms.entry(Box::from(term)).or_insert(0) += n;
        self.count = OnceLock::new();
        Ok(())
    }

    /// Total number of term occurrences (stop words were already dropped at
    /// construction). Memoized.
    pub fn count(&self) -> u64 {
        *self
            .count
            .get_or_init(|| self.terms.values().map(|&n| n as u64).sum())
    }

    /// tf = occurrences of the term / total occurrences; 0 for absent terms.
    pub fn term_frequency(&self, term: &str) -> f64 {
        let total = self.count();
        if total == 0 {
            return 0.0;
        }
        self.terms.get(term).copied().unwrap_or(0) as f64 / total as f64
    }

    /// The document's term-frequency vector, memoized. When the document
    /// belongs to a corpus, [`Corpus::document_vector`](crate::Corpus::document_vector)
    /// yields the corpus-weighted (tf-idf) vector instead.
    pub fn tf_vector(&self) -> &Vector {
        self.tf_vec.get_or_init(|| {
            Vector::with_weight(
                Weight::Tf,
                self.terms
                    .keys()
                    .map(|w| (w.clone(), self.term_frequency(w))),
            )
        })
    }

    /// Top keywords by normalized term frequency, ties broken lexically.
    pub fn keywords(&self, top: usize) -> Vec<(f64, String)> {
        self.tf_vector().keywords(top)
    }

    /// Similarity between two standalone documents, from their tf vectors.
    /// Documents sharing a corpus should be compared through
    /// [`Corpus::cosine_similarity`](crate::Corpus::cosine_similarity), which
    /// caches the result.
    pub fn cosine_similarity(&self, other: &Document) -> f64 {
        let v1 = self.tf_vector();
        let v2 = other.tf_vector();
        let denominator = v1.norm() * v2.norm();
        let denominator = if denominator != 0.0 { denominator } else { 1.0 };
        v1.dot(v2) / denominator
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Document {}

/// File stem with underscores mapped to spaces:
/// `corpus/aesthetics_and_art.txt` becomes `aesthetics and art`.
fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace('_', " "))
        .unwrap_or_default()
}
