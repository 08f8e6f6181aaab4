//! Error types for reference store operations.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::types::Status;

/// Coarse classification of every failure the tool can report.
///
/// Library errors map onto one of these through their `kind()` method so
/// that batch reports and the CLI can name a failure without matching on
/// each crate's error enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    OriginNotFound,
    AliasAlreadyLinked,
    LinkCreationFailed,
    StoreUnavailable,
    EncodingError,
    RecordNotFound,
    AliasRemovalFailed,
    CopySourceReadFailed,
    CopyDestWriteFailed,
    CopySizeMismatch,
    StoreLocked,
    CorruptRecord,
    StatusRegression,
    RecordMismatch,
    NotLinked,
    UnsupportedOrigin,
    Io,
}

impl ErrorKind {
    /// The kind's name as printed in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::OriginNotFound => "OriginNotFound",
            ErrorKind::AliasAlreadyLinked => "AliasAlreadyLinked",
            ErrorKind::LinkCreationFailed => "LinkCreationFailed",
            ErrorKind::StoreUnavailable => "StoreUnavailable",
            ErrorKind::EncodingError => "EncodingError",
            ErrorKind::RecordNotFound => "RecordNotFound",
            ErrorKind::AliasRemovalFailed => "AliasRemovalFailed",
            ErrorKind::CopySourceReadFailed => "CopySourceReadFailed",
            ErrorKind::CopyDestWriteFailed => "CopyDestWriteFailed",
            ErrorKind::CopySizeMismatch => "CopySizeMismatch",
            ErrorKind::StoreLocked => "StoreLocked",
            ErrorKind::CorruptRecord => "CorruptRecord",
            ErrorKind::StatusRegression => "StatusRegression",
            ErrorKind::RecordMismatch => "RecordMismatch",
            ErrorKind::NotLinked => "NotLinked",
            ErrorKind::UnsupportedOrigin => "UnsupportedOrigin",
            ErrorKind::Io => "Io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during reference store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file or its directory could not be created or opened.
    #[error("store unavailable at {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A record field cannot be represented in the line format.
    #[error("cannot encode {field} {value:?}: {reason}")]
    Encoding {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// No record lives at the requested index.
    #[error("no record at index {index} (store holds {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// No active record claims the requested alias.
    #[error("no active record for alias {}", alias.display())]
    AliasNotFound { alias: PathBuf },

    /// Another active record already claims this alias.
    #[error("alias {} is already linked to {}", alias.display(), origin.display())]
    AliasTaken { alias: PathBuf, origin: PathBuf },

    /// The store lock could not be acquired before the timeout elapsed.
    #[error("store {} is locked by another process (waited {waited:?})", path.display())]
    Locked { path: PathBuf, waited: Duration },

    /// A stored line could not be decoded.
    #[error("corrupt record at index {index} (line {line}): {reason}")]
    Corrupt {
        index: usize,
        line: usize,
        reason: String,
    },

    /// The update would move a record's status backwards.
    #[error("status cannot move from {from} back to {to}")]
    StatusRegression { from: Status, to: Status },

    /// The record at the index no longer names the alias being updated.
    #[error(
        "record {index} names alias {} but the update is for {}",
        found.display(),
        expected.display()
    )]
    RecordMismatch {
        index: usize,
        expected: PathBuf,
        found: PathBuf,
    },

    /// Unexpected I/O error while reading or rewriting the store.
    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unavailable { .. } => ErrorKind::StoreUnavailable,
            StoreError::Encoding { .. } => ErrorKind::EncodingError,
            StoreError::IndexOutOfRange { .. } | StoreError::AliasNotFound { .. } => {
                ErrorKind::RecordNotFound
            }
            StoreError::AliasTaken { .. } => ErrorKind::AliasAlreadyLinked,
            StoreError::Locked { .. } => ErrorKind::StoreLocked,
            StoreError::Corrupt { .. } => ErrorKind::CorruptRecord,
            StoreError::StatusRegression { .. } => ErrorKind::StatusRegression,
            StoreError::RecordMismatch { .. } => ErrorKind::RecordMismatch,
            StoreError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Convenience type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
