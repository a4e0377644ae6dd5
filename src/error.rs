use std::io;

use thiserror::Error;

use crate::model::Identity;

/// Errors surfaced by the library outside of a search pass.
///
/// Failures inside a pass never use this type directly: they are absorbed
/// per node (see [`ReadError`]) or reported through `SearchResult::error`.
#[derive(Debug, Error)]
pub enum RefHuntError {
    #[error("file system error: {0}")]
    Io(#[from] io::Error),
    #[error("(de)serialization error: {0}")]
    Serialization(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid schema: {0}")]
    Schema(String),
    #[error("invalid project content in {path}: {message}")]
    Project { path: String, message: String },
    #[error("operation cancelled")]
    Cancelled,
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<bincode::error::EncodeError> for RefHuntError {
    fn from(err: bincode::error::EncodeError) -> Self {
        RefHuntError::Serialization(err.to_string())
    }
}

impl From<tempfile::PersistError> for RefHuntError {
    fn from(err: tempfile::PersistError) -> Self {
        RefHuntError::Io(err.error)
    }
}

/// A failure to read one accessor's value.
///
/// Always recoverable: the walker logs it and treats the accessor as empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The owning object was destroyed (or is being destroyed).
    #[error("object is destroyed")]
    Destroyed,
    /// The value refers to an identity the host cannot resolve.
    #[error("dangling reference to {0}")]
    Dangling(Identity),
    /// The backing store could not be read.
    #[error("unreadable value: {0}")]
    Unreadable(String),
}
