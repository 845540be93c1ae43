//! backend::traits
//!
//! The filesystem and advisory-locking facilities a lock record drives.
//!
//! # Design
//!
//! The lock driver never touches the filesystem directly. It asks a
//! [`LockBackend`] to open the backing file, try an exclusive advisory lock
//! on it, and close it again. Errors are plain `std::io::Error`s so the
//! retry policy can classify them by OS error code.
//!
//! # Example
//!
//! ```ignore
//! use flockq::backend::{LockBackend, OsBackend};
//!
//! async fn probe(backend: &OsBackend, path: &LockPath) -> std::io::Result<()> {
//!     let mut handle = backend.open(path, 0o644).await?;
//!     backend.try_lock_exclusive(&mut handle).await?;
//!     backend.close(&mut handle).await
//! }
//! ```

use std::io;

use async_trait::async_trait;

use crate::core::paths::LockPath;

/// Facilities a lock record needs from the host.
///
/// Implementations must be thread-safe (Send + Sync); every record's
/// driver task shares one backend.
#[async_trait]
pub trait LockBackend: Send + Sync + 'static {
    /// An open backing file.
    type Handle: Send + 'static;

    /// Open `path` read/write, creating it with `mode` if absent.
    ///
    /// The file's content is never read or written.
    async fn open(&self, path: &LockPath, mode: u32) -> io::Result<Self::Handle>;

    /// Try to take an exclusive advisory lock without blocking.
    ///
    /// Contention must be reported as an error (for example `EWOULDBLOCK`),
    /// never by waiting.
    async fn try_lock_exclusive(&self, handle: &mut Self::Handle) -> io::Result<()>;

    /// Release any lock held through `handle` and close it.
    ///
    /// The handle is dropped by the caller after this returns, whatever
    /// the result.
    async fn close(&self, handle: &mut Self::Handle) -> io::Result<()>;
}
