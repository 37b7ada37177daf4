// Error kinds for the load pipeline and the query layer

use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop a source file (or the lookup table) from being read.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("source file {path} is unreadable or malformed: {reason}")]
    SourceFile { path: PathBuf, reason: String },

    #[error("location table {path} could not be loaded: {reason}")]
    LocationTable { path: PathBuf, reason: String },

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// A single record that could not be turned into a canonical document.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record {record_id}: required field '{field}' is missing or blank")]
    MissingField { record_id: String, field: &'static str },

    #[error("record {record_id}: expected a JSON object, found {found}")]
    NotAnObject { record_id: String, found: &'static str },
}

/// Errors raised by a `DocumentIndex`.
///
/// Only `Connectivity` is fatal for a load run; rejected documents are
/// reported through `BulkOutcome` instead.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index unreachable: {0}")]
    Connectivity(String),

    #[error("unknown index '{0}'")]
    UnknownIndex(String),
}

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        IndexError::Connectivity(err.to_string())
    }
}

/// Why a pagination token was rejected. Never surfaced to callers.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("token is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("token payload is not a cursor: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("cursor carries {0} sort values, expected 2")]
    Arity(usize),
}

/// Errors returned by the query service.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown index '{0}'")]
    UnknownIndex(String),

    #[error("index query failed: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("stored document {id} is not valid JSON: {source}")]
    CorruptDocument {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}
