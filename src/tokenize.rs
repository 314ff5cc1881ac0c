//! Word splitting and counting.
//!
//! The engine treats tokenization as a collaborator: [`words`] is a plain
//! default that splits on spaces and strips punctuation, and both the word
//! filter and the stemmer are pluggable functions on [`TokenizeOptions`].

use indexmap::IndexMap;

/// Punctuation stripped from the head and tail of each word.
pub const PUNCTUATION: &str = "*#[]():;,.!?\n\r\t\u{c}- ";

/// Maps a token to its canonical (stemmed) form.
pub type Stemmer = fn(&str) -> String;

/// Decides whether a raw word is kept.
pub type WordFilter = fn(&str) -> bool;

/// Keeps alphabetic words longer than one character.
pub fn default_filter(word: &str) -> bool {
    word.len() > 1 && word.chars().all(|c| c.is_alphabetic())
}

/// Keeps every word. Used when re-reading text that was saved by the engine
/// itself and is already canonical.
pub fn keep_all(_: &str) -> bool {
    true
}

/// Options shared by [`words`] and [`count`].
#[derive(Clone)]
pub struct TokenizeOptions {
    /// Raw-word predicate applied before counting.
    pub filter: WordFilter,
    /// Characters stripped from word boundaries.
    pub punctuation: &'static str,
    /// Keep stop words instead of dropping them.
    pub keep_stopwords: bool,
    /// Optional canonicalization hook; `None` leaves words as-is.
    pub stemmer: Option<Stemmer>,
    /// Words never counted, checked after lowercasing.
    pub exclude: Vec<String>,
    /// Words whose count falls at or below this value are dropped.
    pub threshold: u32,
    /// Keep only the most frequent `top` words, if set.
    pub top: Option<usize>,
}

impl Default for TokenizeOptions {
    fn default() -> Self {
        TokenizeOptions {
            filter: default_filter,
            punctuation: PUNCTUATION,
            keep_stopwords: false,
            stemmer: None,
            exclude: Vec::new(),
            threshold: 0,
            top: None,
        }
    }
}

impl TokenizeOptions {
    /// Options used by `Document::load`: the saved material is already
    /// canonical, so nothing is filtered, stripped or stemmed.
    pub fn raw() -> Self {
        TokenizeOptions {
            filter: keep_all,
            punctuation: "",
            keep_stopwords: true,
            ..TokenizeOptions::default()
        }
    }
}

/// Splits the given string into words, stripping common punctuation marks
/// and a trailing `'s` from each.
pub fn words(text: &str, opts: &TokenizeOptions) -> Vec<String> {
    let text = text.replace('\u{2019}', "'").replace('\n', "\n ");
    text.split(' ')
        .map(|w| {
            let w = w.trim_matches(|c| opts.punctuation.contains(c));
            w.strip_suffix("'s").unwrap_or(w)
        })
        .filter(|w| (opts.filter)(w))
        .map(str::to_owned)
        .collect()
}

/// Returns a map of (word, count) items in lowercase, preserving first-seen
/// order. Stop words and excluded words are not counted; words are stemmed
/// when a stemmer is configured.
pub fn count<T: AsRef<str>>(tokens: &[T], opts: &TokenizeOptions) -> IndexMap<Box<str>, u32> {
    let mut counts: IndexMap<Box<str>, u32> = IndexMap::new();
    for token in tokens {
        let w = token.as_ref().to_lowercase();
        if !opts.keep_stopwords && is_stopword(&w) {
            continue;
        }
        if opts.exclude.iter().any(|x| x == &w) {
            continue;
        }
        let w = match opts.stemmer {
            Some(stem) => stem(&w),
            None => w,
        };
        *counts.entry(w.into_boxed_str()).or_insert(0) += 1;
    }
    if opts.threshold > 0 {
        counts.retain(|_, &mut n| n > opts.threshold);
    }
    if let Some(top) = opts.top {
        if counts.len() > top {
            counts.sort_by(|_, a, _, b| b.cmp(a));
            counts.truncate(top);
        }
    }
    counts
}

/// Common English function words, kept sorted for binary search.
const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "am", "an", "and",
    "any", "are", "as", "at", "be", "because", "been", "before", "being",
    "below", "between", "both", "but", "by", "can", "cannot", "could", "did",
    "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "if", "in", "into", "is", "it",
    "its", "itself", "me", "more", "most", "my", "myself", "no", "nor", "not",
    "of", "off", "on", "once", "only", "or", "other", "ought", "our", "ours",
    "ourselves", "out", "over", "own", "same", "she", "should", "so", "some",
    "such", "than", "that", "the", "their", "theirs", "them", "themselves",
    "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "with", "would", "you",
    "your", "yours", "yourself", "yourselves",
];

/// Whether the given lowercase word is a stop word.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.binary_search(&word).is_ok()
}
