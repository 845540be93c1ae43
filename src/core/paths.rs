//! core::paths
//!
//! Normalized lock-file paths.
//!
//! # Architecture
//!
//! Every lock record is keyed by a [`LockPath`]. Two spellings of the same
//! file (`/tmp/./x`, `/tmp//x`, `/tmp/y/../x`) must map to one record,
//! otherwise the process would race itself for the advisory lock.
//!
//! Normalization is lexical: relative paths are joined onto the current
//! directory, then `.` components are dropped and `..` pops the previous
//! component. Symlinks are not resolved because the target file may not
//! exist yet.
//!
//! # Example
//!
//! ```
//! use flockq::core::paths::LockPath;
//!
//! let a = LockPath::new("/var/lock/./app//db.lock").unwrap();
//! let b = LockPath::new("/var/lock/tmp/../app/db.lock").unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.as_path(), std::path::Path::new("/var/lock/app/db.lock"));
//! ```

use std::fmt;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Errors from path normalization.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("lock path cannot be empty")]
    Empty,

    #[error("cannot resolve relative lock path '{path}': {source}")]
    NoCurrentDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("lock path '{0}' does not name a file")]
    NotAFile(PathBuf),
}

/// A normalized, absolute lock-file path.
///
/// # Invariants
///
/// - Always absolute
/// - Contains no `.` or `..` components and no redundant separators
/// - Has a final file-name component
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockPath(PathBuf);

impl LockPath {
    /// Normalize `path` into a lock path.
    ///
    /// Relative paths are resolved against the process's current directory.
    ///
    /// # Errors
    ///
    /// - [`PathError::Empty`] for an empty path
    /// - [`PathError::NoCurrentDir`] if a relative path cannot be anchored
    /// - [`PathError::NotAFile`] if the path normalizes to a root
    pub fn new(path: impl AsRef<Path>) -> Result<Self, PathError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(PathError::Empty);
        }

        if path.is_absolute() {
            return Self::from_absolute(path);
        }

        let cwd = std::env::current_dir().map_err(|source| PathError::NoCurrentDir {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_base(&cwd, path)
    }

    /// Normalize a path relative to an explicit base directory.
    ///
    /// # Example
    ///
    /// ```
    /// use flockq::core::paths::LockPath;
    /// use std::path::Path;
    ///
    /// let p = LockPath::with_base(Path::new("/srv"), "locks/../run/a.lock").unwrap();
    /// assert_eq!(p.as_path(), Path::new("/srv/run/a.lock"));
    /// ```
    pub fn with_base(base: &Path, path: impl AsRef<Path>) -> Result<Self, PathError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(PathError::Empty);
        }
        Self::from_absolute(&base.join(path))
    }

    fn from_absolute(path: &Path) -> Result<Self, PathError> {
        let normalized = normalize_lexically(path);
        if normalized.file_name().is_none() {
            return Err(PathError::NotAFile(path.to_path_buf()));
        }
        Ok(Self(normalized))
    }

    /// Get the normalized path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for LockPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for LockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Resolve `.`, `..`, and repeated separators without touching the filesystem.
///
/// `..` at the root stays at the root, matching how the kernel resolves it.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_is_kept() {
        let p = LockPath::new("/tmp/x").unwrap();
        assert_eq!(p.as_path(), Path::new("/tmp/x"));
    }

    #[test]
    fn dot_components_are_dropped() {
        let p = LockPath::new("/tmp/./a/./x").unwrap();
        assert_eq!(p.as_path(), Path::new("/tmp/a/x"));
    }

    #[test]
    fn redundant_separators_are_collapsed() {
        let p = LockPath::new("//tmp///a//x").unwrap();
        assert!(p.to_string().ends_with("tmp/a/x"));
        assert!(!p.to_string().contains("//tmp"));
    }

    #[test]
    fn parent_components_are_resolved() {
        let p = LockPath::new("/tmp/a/b/../../x").unwrap();
        assert_eq!(p.as_path(), Path::new("/tmp/x"));
    }

    #[test]
    fn parent_at_root_stays_at_root() {
        let p = LockPath::new("/../../tmp/x").unwrap();
        assert_eq!(p.as_path(), Path::new("/tmp/x"));
    }

    #[test]
    fn relative_path_is_anchored_at_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let p = LockPath::new("some.lock").unwrap();
        assert_eq!(p.as_path(), normalize_lexically(&cwd.join("some.lock")));
        assert!(p.as_path().is_absolute());
    }

    #[test]
    fn with_base_resolves_against_base() {
        let p = LockPath::with_base(Path::new("/srv/app"), "../run/./a.lock").unwrap();
        assert_eq!(p.as_path(), Path::new("/srv/run/a.lock"));
    }

    #[test]
    fn with_base_ignores_base_for_absolute() {
        let p = LockPath::with_base(Path::new("/srv"), "/etc/a.lock").unwrap();
        assert_eq!(p.as_path(), Path::new("/etc/a.lock"));
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(matches!(LockPath::new(""), Err(PathError::Empty)));
    }

    #[test]
    fn root_is_rejected() {
        assert!(matches!(LockPath::new("/"), Err(PathError::NotAFile(_))));
        assert!(matches!(LockPath::new("/tmp/.."), Err(PathError::NotAFile(_))));
    }

    #[test]
    fn spellings_of_same_file_compare_equal() {
        let a = LockPath::new("/tmp/x").unwrap();
        let b = LockPath::new("/tmp/y/../x").unwrap();
        let c = LockPath::new("/tmp/./x").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }
}
