use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the vector space engine.
///
/// Every variant is local to a single call: an operation either returns its
/// full computed value or one of these, never a partial result.
#[derive(Error, Debug)]
pub enum Error {
    /// Unsupported input shape passed to a constructor.
    #[error("unsupported input: {0}")]
    TypeMismatch(String),

    /// Combining a tf vector with a tf-idf vector (or vice versa).
    #[error("mixing {0} vector with {1} vector")]
    WeightMismatch(&'static str, &'static str),

    /// Mutating a frozen term mapping or locked collection.
    #[error("read-only: {0}")]
    ReadOnly(&'static str),

    /// LSA retained rank must be smaller than the number of documents.
    #[error("cannot retain {rank} dimensions with only {documents} documents")]
    Dimension { rank: usize, documents: usize },

    /// Singular value decomposition did not converge.
    #[error("singular value decomposition failed to converge")]
    Svd,

    /// A document name was not found in the corpus index.
    #[error("no document named {0:?} in the corpus")]
    UnknownDocument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed persisted data; loading fails fast, nothing is recovered.
    #[error("corrupt corpus data: {0}")]
    Codec(#[from] serde_cbor::Error),

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}
