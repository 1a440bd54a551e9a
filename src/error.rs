use std::fmt;
use std::io;
use std::path::PathBuf;

/// Recoverable, user-facing failures of an annotation action.
///
/// None of these are fatal: callers turn them into a notice and carry on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotateError {
    /// Nothing to work with (no keywords, no usable replace pairs, blank name).
    EmptyInput { what: &'static str },
    /// Input was valid but the scan found zero occurrences.
    NoMatch,
    /// A mode with this name already exists.
    NameConflict { name: String },
    /// The default mode cannot be renamed or deleted.
    ProtectedMode { name: String },
    UnknownMode { name: String },
    InvalidIndex { index: usize, len: usize },
    /// Commas separate keywords in the persisted list, so one keyword cannot hold one.
    InvalidKeyword { word: String },
}

impl fmt::Display for AnnotateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput { what } => write!(f, "no {what} supplied"),
            Self::NoMatch => write!(f, "no matches found"),
            Self::NameConflict { name } => write!(f, "a mode named {name:?} already exists"),
            Self::ProtectedMode { name } => {
                write!(f, "mode {name:?} is protected and cannot be changed")
            }
            Self::UnknownMode { name } => write!(f, "no mode named {name:?}"),
            Self::InvalidIndex { index, len } => {
                write!(f, "index {index} is out of range (have {len})")
            }
            Self::InvalidKeyword { word } => write!(f, "keyword {word:?} contains a comma"),
        }
    }
}

impl std::error::Error for AnnotateError {}

/// Failure of the underlying key-value store.
#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, source: io::Error },
    Json { key: String, source: serde_json::Error },
    InvalidKey { key: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error at {path:?}: {source}"),
            Self::Json { key, source } => write!(f, "json error in record {key:?}: {source}"),
            Self::InvalidKey { key } => write!(f, "invalid store key {key:?}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::InvalidKey { .. } => None,
        }
    }
}
