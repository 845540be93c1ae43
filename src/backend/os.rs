//! backend::os
//!
//! Real filesystem backend using OS-level advisory locks via `fs2`.
//!
//! # Semantics
//!
//! - `open` creates the file with the configured mode and never truncates it
//! - `try_lock_exclusive` is `flock(LOCK_EX | LOCK_NB)` on Unix and
//!   `LockFileEx` with `LOCKFILE_FAIL_IMMEDIATELY` on Windows
//! - `close` unlocks (if locked) and closes the descriptor, reporting a
//!   failing `close(2)`; a handle dropped without `close` still closes quietly
//!
//! Advisory locks only bind cooperating processes. Within one process,
//! `flock` locks belong to the open file description, so two handles on the
//! same path contend with each other just as two processes would.

use std::fs::File;
use std::io;

use async_trait::async_trait;
use fs2::FileExt;

use super::traits::LockBackend;
use crate::core::paths::LockPath;

/// Backend that opens and locks real files.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsBackend;

impl OsBackend {
    /// Create a new OS backend.
    pub fn new() -> Self {
        Self
    }
}

/// An open lock file.
#[derive(Debug)]
pub struct OsLockFile {
    /// `None` once closed.
    file: Option<File>,
    /// Whether this handle currently holds the advisory lock.
    locked: bool,
}

impl OsLockFile {
    /// Whether this handle holds the advisory lock.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Whether the descriptor is still open.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn file(&self) -> io::Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| io::Error::other("lock file already closed"))
    }
}

/// Close `file`, surfacing the error std's `Drop` would swallow.
#[cfg(unix)]
fn close_file(file: File) -> io::Result<()> {
    use std::os::unix::io::IntoRawFd;

    let fd = file.into_raw_fd();
    // SAFETY: `fd` came from `into_raw_fd`, so nothing else owns or closes it.
    if unsafe { libc::close(fd) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn close_file(file: File) -> io::Result<()> {
    drop(file);
    Ok(())
}

#[async_trait]
impl LockBackend for OsBackend {
    type Handle = OsLockFile;

    async fn open(&self, path: &LockPath, mode: u32) -> io::Result<OsLockFile> {
        let mut options = tokio::fs::OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        #[cfg(unix)]
        options.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;

        let file = options.open(path.as_path()).await?.into_std().await;
        Ok(OsLockFile {
            file: Some(file),
            locked: false,
        })
    }

    async fn try_lock_exclusive(&self, handle: &mut OsLockFile) -> io::Result<()> {
        // Non-blocking. Called through `FileExt`: std's inherent
        // `File::try_lock_exclusive` returns a different error type.
        FileExt::try_lock_exclusive(handle.file()?)?;
        handle.locked = true;
        Ok(())
    }

    async fn close(&self, handle: &mut OsLockFile) -> io::Result<()> {
        let Some(file) = handle.file.take() else {
            return Ok(());
        };
        let unlocked = if handle.locked {
            handle.locked = false;
            FileExt::unlock(&file)
        } else {
            Ok(())
        };
        // The descriptor is closed even when unlocking failed.
        let closed = close_file(file);
        unlocked.and(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    fn lock_path(temp: &TempDir, name: &str) -> LockPath {
        LockPath::new(temp.path().join(name)).expect("lock path")
    }

    #[tokio::test]
    async fn open_creates_missing_file() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp, "a.lock");
        assert!(!path.as_path().exists());

        let handle = OsBackend::new().open(&path, 0o644).await.expect("open");
        assert!(path.as_path().exists());
        assert!(!handle.is_locked());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn open_applies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp, "mode.lock");

        let _handle = OsBackend::new().open(&path, 0o600).await.expect("open");
        let mode = std::fs::metadata(path.as_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[tokio::test]
    async fn open_fails_when_directory_missing() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp, "missing/a.lock");

        let err = OsBackend::new().open(&path, 0o644).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn open_does_not_truncate() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp, "content.lock");
        std::fs::write(path.as_path(), b"keep").unwrap();

        let _handle = OsBackend::new().open(&path, 0o644).await.expect("open");
        assert_eq!(std::fs::read(path.as_path()).unwrap(), b"keep");
    }

    #[tokio::test]
    async fn lock_is_exclusive_across_handles() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp, "x.lock");
        let backend = OsBackend::new();

        let mut first = backend.open(&path, 0o644).await.expect("open 1");
        backend
            .try_lock_exclusive(&mut first)
            .await
            .expect("lock 1");
        assert!(first.is_locked());

        // A second open file description contends like another process.
        let second = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_path())
            .expect("open 2");
        let err = FileExt::try_lock_exclusive(&second).unwrap_err();
        assert_eq!(
            err.raw_os_error(),
            fs2::lock_contended_error().raw_os_error()
        );

        backend.close(&mut first).await.expect("close");
        assert!(!first.is_locked());
        FileExt::try_lock_exclusive(&second).expect("lock after close");
    }

    #[tokio::test]
    async fn close_without_lock_is_ok() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp, "idle.lock");
        let backend = OsBackend::new();

        let mut handle = backend.open(&path, 0o644).await.expect("open");
        backend.close(&mut handle).await.expect("close");
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn close_consumes_descriptor() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp, "fd.lock");
        let backend = OsBackend::new();

        let mut handle = backend.open(&path, 0o644).await.expect("open");
        backend
            .try_lock_exclusive(&mut handle)
            .await
            .expect("lock");
        assert!(handle.is_open());

        backend.close(&mut handle).await.expect("close");
        assert!(!handle.is_open());
        assert!(!handle.is_locked());

        // A closed handle cannot be locked again; closing it twice is a no-op.
        assert!(backend.try_lock_exclusive(&mut handle).await.is_err());
        backend.close(&mut handle).await.expect("second close");
    }
}
