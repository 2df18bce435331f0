//! Error types for CFI parsing, resolution and generation

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, CfiError>;

/// Top-level CFI error
#[derive(Debug, Error)]
pub enum CfiError {
    /// The CFI string could not be parsed
    #[error("Malformed CFI: {0}")]
    MalformedInput(#[from] ParseError),

    /// The CFI could not be mapped onto the supplied document
    #[error("Resolution failed: {0}")]
    ResolutionFailure(String),

    /// The addressed element does not link to another document
    #[error("No URI found: {0}")]
    LinkNotFound(String),

    /// The document-fetch collaborator failed or was not supplied
    #[error("Transport failure: {0}")]
    TransportFailure(#[from] FetchError),
}

/// CFI parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("CFI must be wrapped in 'epubcfi(...)'")]
    MissingWrapper,

    #[error("CFI path is empty")]
    EmptyPath,

    #[error("Expected '/' at position {0}")]
    ExpectedStep(usize),

    #[error("Missing nodeIndex at position {0}")]
    MissingNodeIndex(usize),

    #[error("Unclosed bracket at position {0}")]
    UnclosedBracket(usize),

    #[error("Invalid character offset at position {0}")]
    InvalidOffset(usize),

    #[error("Invalid temporal offset at position {0}")]
    InvalidTemporal(usize),

    #[error("Invalid spatial offset at position {0}")]
    InvalidSpatial(usize),

    #[error("Character offset cannot be combined with a temporal or spatial offset (position {0})")]
    IllegalQualifier(usize),

    #[error("Range spans documents (position {0})")]
    RangeSpansDocuments(usize),

    #[error("Too many range separators at position {0}")]
    TooManyCommas(usize),

    #[error("Unexpected input after the closing ')' at position {0}")]
    TrailingInput(usize),

    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
}

/// Errors surfaced by a document-fetch collaborator
#[derive(Debug, Error)]
pub enum FetchError {
    /// A document hop was required but no fetcher was configured
    #[error("No document fetcher supplied for '{0}'")]
    Missing(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Fetch rejected for '{uri}': {reason}")]
    Rejected { uri: String, reason: String },
}
