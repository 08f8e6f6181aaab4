//! Error types for alias operations.

use std::io;
use std::path::PathBuf;

use ssd_store::{ErrorKind, Status, StoreError};
use thiserror::Error;

use crate::classify::PathKind;

/// Errors from linking, materializing and unlinking.
#[derive(Debug, Error)]
pub enum HitError {
    /// The origin does not exist.
    #[error("origin not found: {}", origin.display())]
    OriginNotFound { origin: PathBuf },

    /// An active record already claims the alias.
    #[error("alias {} is already linked to {}", alias.display(), origin.display())]
    AliasAlreadyLinked { alias: PathBuf, origin: PathBuf },

    /// The OS refused to create the symlink.
    #[error("could not link {} -> {}: {source}", alias.display(), origin.display())]
    LinkCreationFailed {
        origin: PathBuf,
        alias: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The alias could not be removed before copying.
    #[error("could not remove alias {}: {source}", alias.display())]
    AliasRemovalFailed {
        alias: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading the origin failed.
    #[error("could not read origin {}: {source}", origin.display())]
    CopySourceReadFailed {
        origin: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the copy failed.
    #[error("could not write copy for {}: {source}", alias.display())]
    CopyDestWriteFailed {
        alias: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The finished copy is not the size the origin had when copying began.
    #[error("copy for {} is {actual} bytes, origin was {expected} bytes", alias.display())]
    CopySizeMismatch {
        alias: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Only `linked` records can be materialized.
    #[error("alias {} is {status}, not linked", alias.display())]
    NotLinked { alias: PathBuf, status: Status },

    /// The origin is not a regular file.
    #[error("origin {} is a {kind}; only regular files can be materialized", origin.display())]
    UnsupportedOrigin { origin: PathBuf, kind: PathKind },

    /// Reference store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HitError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HitError::OriginNotFound { .. } => ErrorKind::OriginNotFound,
            HitError::AliasAlreadyLinked { .. } => ErrorKind::AliasAlreadyLinked,
            HitError::LinkCreationFailed { .. } => ErrorKind::LinkCreationFailed,
            HitError::AliasRemovalFailed { .. } => ErrorKind::AliasRemovalFailed,
            HitError::CopySourceReadFailed { .. } => ErrorKind::CopySourceReadFailed,
            HitError::CopyDestWriteFailed { .. } => ErrorKind::CopyDestWriteFailed,
            HitError::CopySizeMismatch { .. } => ErrorKind::CopySizeMismatch,
            HitError::NotLinked { .. } => ErrorKind::NotLinked,
            HitError::UnsupportedOrigin { .. } => ErrorKind::UnsupportedOrigin,
            HitError::Store(e) => e.kind(),
        }
    }
}

/// Convenience type alias for alias operations.
pub type Result<T> = std::result::Result<T, HitError>;
