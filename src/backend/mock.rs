//! backend::mock
//!
//! Mock backend implementation for deterministic testing.
//!
//! # Design
//!
//! The mock keeps an in-memory table of "files" and which handle holds each
//! one's advisory lock. Tests can script failures for the next open, lock
//! attempt, or close on a given path, and can simulate another process
//! holding a lock with [`MockBackend::hold_externally`].
//!
//! All operations complete without suspending, so the mock is usable under
//! a paused tokio clock.
//!
//! # Example
//!
//! ```
//! use flockq::backend::{LockBackend, MockBackend};
//! use flockq::core::paths::LockPath;
//! use std::io;
//!
//! # tokio_test::block_on(async {
//! let backend = MockBackend::new();
//! let path = LockPath::new("/mock/a.lock").unwrap();
//!
//! backend.fail_next_lock(&path, io::ErrorKind::PermissionDenied.into());
//!
//! let mut handle = backend.open(&path, 0o644).await.unwrap();
//! assert!(backend.try_lock_exclusive(&mut handle).await.is_err());
//! assert!(backend.try_lock_exclusive(&mut handle).await.is_ok());
//! assert_eq!(backend.lock_attempts(&path), 2);
//! # });
//! ```

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::traits::LockBackend;
use crate::core::paths::LockPath;

/// Mock backend for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<MockBackendInner>>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MockBackendInner {
    /// Per-path bookkeeping.
    files: HashMap<PathBuf, MockFile>,
    /// Next handle id.
    next_handle: u64,
}

#[derive(Debug, Default)]
struct MockFile {
    /// Handle id holding the advisory lock.
    holder: Option<u64>,
    /// Whether a simulated foreign process holds the lock.
    external: bool,
    /// Mode passed to the most recent open.
    mode: Option<u32>,
    open_failures: VecDeque<io::Error>,
    lock_failures: VecDeque<io::Error>,
    close_failures: VecDeque<io::Error>,
    opens: usize,
    lock_attempts: usize,
    closes: usize,
    /// Handles currently open on this path.
    open_handles: usize,
}

/// An open mock file.
#[derive(Debug)]
pub struct MockHandle {
    path: PathBuf,
    id: u64,
}

impl MockHandle {
    /// Identifier of this handle, unique per backend.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl MockBackend {
    /// Create a new, empty mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockBackendInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_file<R>(&self, path: &LockPath, f: impl FnOnce(&mut MockFile) -> R) -> R {
        let mut inner = self.lock();
        let file = inner.files.entry(path.as_path().to_path_buf()).or_default();
        f(file)
    }

    /// Make the next `open` of `path` fail with `err`.
    pub fn fail_next_open(&self, path: &LockPath, err: io::Error) {
        self.with_file(path, |f| f.open_failures.push_back(err));
    }

    /// Make the next lock attempt on `path` fail with `err`.
    ///
    /// Calls queue up: each attempt consumes one scripted failure.
    pub fn fail_next_lock(&self, path: &LockPath, err: io::Error) {
        self.with_file(path, |f| f.lock_failures.push_back(err));
    }

    /// Make the next `close` on `path` fail with `err`.
    ///
    /// The lock is still dropped, as closing a descriptor always drops it.
    pub fn fail_next_close(&self, path: &LockPath, err: io::Error) {
        self.with_file(path, |f| f.close_failures.push_back(err));
    }

    /// Simulate another process taking the lock on `path`.
    pub fn hold_externally(&self, path: &LockPath) {
        self.with_file(path, |f| f.external = true);
    }

    /// Simulate the other process letting go of `path`.
    pub fn release_externally(&self, path: &LockPath) {
        self.with_file(path, |f| f.external = false);
    }

    /// Number of `open` calls on `path`, including failed ones.
    pub fn opens(&self, path: &LockPath) -> usize {
        self.with_file(path, |f| f.opens)
    }

    /// Number of lock attempts on `path`, including failed ones.
    pub fn lock_attempts(&self, path: &LockPath) -> usize {
        self.with_file(path, |f| f.lock_attempts)
    }

    /// Number of `close` calls on `path`.
    pub fn closes(&self, path: &LockPath) -> usize {
        self.with_file(path, |f| f.closes)
    }

    /// Whether a handle from this process holds the lock on `path`.
    pub fn is_locked(&self, path: &LockPath) -> bool {
        self.with_file(path, |f| f.holder.is_some())
    }

    /// Number of handles currently open on `path`.
    pub fn open_handles(&self, path: &LockPath) -> usize {
        self.with_file(path, |f| f.open_handles)
    }

    /// Mode passed to the most recent `open` of `path`.
    pub fn last_mode(&self, path: &LockPath) -> Option<u32> {
        self.with_file(path, |f| f.mode)
    }
}

#[async_trait]
impl LockBackend for MockBackend {
    type Handle = MockHandle;

    async fn open(&self, path: &LockPath, mode: u32) -> io::Result<MockHandle> {
        let mut inner = self.lock();
        inner.next_handle += 1;
        let id = inner.next_handle;

        let file = inner.files.entry(path.as_path().to_path_buf()).or_default();
        file.opens += 1;
        file.mode = Some(mode);
        if let Some(err) = file.open_failures.pop_front() {
            return Err(err);
        }
        file.open_handles += 1;

        Ok(MockHandle {
            path: path.as_path().to_path_buf(),
            id,
        })
    }

    async fn try_lock_exclusive(&self, handle: &mut MockHandle) -> io::Result<()> {
        let mut inner = self.lock();
        let file = inner.files.entry(handle.path.clone()).or_default();
        file.lock_attempts += 1;

        if let Some(err) = file.lock_failures.pop_front() {
            return Err(err);
        }
        if file.external || file.holder.is_some_and(|id| id != handle.id) {
            return Err(io::ErrorKind::WouldBlock.into());
        }

        file.holder = Some(handle.id);
        Ok(())
    }

    async fn close(&self, handle: &mut MockHandle) -> io::Result<()> {
        let mut inner = self.lock();
        let file = inner.files.entry(handle.path.clone()).or_default();
        file.closes += 1;
        file.open_handles = file.open_handles.saturating_sub(1);

        if file.holder == Some(handle.id) {
            file.holder = None;
        }

        match file.close_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
