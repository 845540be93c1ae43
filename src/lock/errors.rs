//! lock::errors
//!
//! Error types for lock acquisition and release.
//!
//! Contention is not an error here: it is retried inside the driver and
//! never reaches a caller.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::paths::PathError;

/// Errors from lock operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// The backing file could not be created or opened.
    #[error("cannot open lock file '{path}': {source}")]
    OpenFailure { path: PathBuf, source: io::Error },

    /// The advisory lock attempt failed with a non-retryable error.
    #[error("cannot lock '{path}': {source}")]
    LockFailure { path: PathBuf, source: io::Error },

    /// A release named a grant that is not the current holder.
    ///
    /// This is a programming error in the caller.
    #[error("mismatched lock holder or already unlocked: '{path}'")]
    HolderMismatch { path: PathBuf },

    /// Closing the backing file failed on release.
    ///
    /// The lock record is still returned to idle.
    #[error("failed to close lock file '{path}': {source}")]
    CloseFailure { path: PathBuf, source: io::Error },

    /// The lock path could not be normalized.
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    /// No tokio runtime was available to drive the lock record.
    #[error("lock manager requires a tokio runtime")]
    NoRuntime,

    /// The record's driver is gone (runtime shut down).
    #[error("lock manager shut down")]
    ManagerShutdown,
}

impl LockError {
    /// The lock path this error concerns, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            LockError::OpenFailure { path, .. }
            | LockError::LockFailure { path, .. }
            | LockError::HolderMismatch { path }
            | LockError::CloseFailure { path, .. } => Some(path),
            LockError::InvalidPath(_) | LockError::NoRuntime | LockError::ManagerShutdown => None,
        }
    }
}
