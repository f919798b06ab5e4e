//! Indexing error types.

use thiserror::Error;

/// Result type alias using [`IndexingError`].
pub type IndexingResult<T> = Result<T, IndexingError>;

/// Errors raised while modifying indexed content.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Reading the underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before the requested offset.
    #[error("The stream is missing {missing} bytes")]
    MissingBytes {
        /// Bytes still expected.
        missing: u64,
    },

    /// A perform refers to an index value the index does not carry.
    #[error("Index for block '{block}' has no value '{name}'")]
    MissingIndexValue {
        /// Block name.
        block: String,
        /// Index value name.
        name: String,
    },

    /// A perform expects an offset but the index value is a literal.
    #[error("Index value '{name}' of block '{block}' is not an offset")]
    NotAnOffset {
        /// Block name.
        block: String,
        /// Index value name.
        name: String,
    },

    /// A raw index refers to a block that is not known.
    #[error("Unknown block '{name}'")]
    UnknownBlock {
        /// Block name.
        name: String,
    },

    /// The escape table could not be compiled.
    #[error("Invalid escapes: {0}")]
    Escapes(#[from] regex::Error),
}
