use std::fmt;

/// Coarse error taxonomy. Each variant corresponds to one of the kinds in the
/// propagation policy: `Parse`/`Validation`/`Schema` abort query compilation,
/// `Storage` aborts execution and discards the partial table, `DocStore` is
/// absorbed by the table assembler for optional columns, `Cancelled`
/// propagates without retry.
#[derive(Debug)]
pub enum ErrorKind {
    Io,
    Parse { offset: usize },
    Validation,
    Schema,
    Storage,
    DocStore,
    Cancelled,
    NotFound,
    InvalidArgument,
    Internal,
    InvalidInput,
    InvalidState,
    UnsupportedQuery,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error { kind, context: context.into() }
    }

    pub fn parse(offset: usize, message: impl Into<String>) -> Self {
        Error { kind: ErrorKind::Parse { offset }, context: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Validation, message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Schema, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Storage, message)
    }

    pub fn doc_store(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::DocStore, message)
    }

    /// True for errors the table assembler may absorb into an empty cell
    /// rather than aborting the whole query (§7: optional-column lookups).
    pub fn is_absorbable(&self) -> bool {
        matches!(self.kind, ErrorKind::DocStore)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse { offset } => write!(f, "ParseError at offset {}: {}", offset, self.context),
            other => write!(f, "{:?}: {}", other, self.context),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Io, err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::new(ErrorKind::Storage, format!("bincode: {}", err))
    }
}

impl From<fst::Error> for Error {
    fn from(err: fst::Error) -> Self {
        Error::new(ErrorKind::Storage, format!("fst: {}", err))
    }
}

impl From<heed::Error> for Error {
    fn from(err: heed::Error) -> Self {
        Error::new(ErrorKind::Storage, format!("heed: {}", err))
    }
}

/// Carries the offset/message pair from §4.7 as a standalone type for
/// callers that only care about parse failures, while still converting into
/// the crate-wide `Error` for the rest of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParseError {
    pub message: String,
    pub offset: usize,
}

impl fmt::Display for QueryParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (at offset {})", self.message, self.offset)
    }
}

impl std::error::Error for QueryParseError {}

impl From<QueryParseError> for Error {
    fn from(err: QueryParseError) -> Self {
        Error::parse(err.offset, err.message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
