//! backend
//!
//! Host facilities behind the lock manager.
//!
//! # Implementations
//!
//! - [`OsBackend`] - Real files and OS advisory locks (`fs2`)
//! - [`MockBackend`] - In-memory, scriptable backend for tests
//!
//! # Example
//!
//! ```ignore
//! use flockq::backend::OsBackend;
//! use flockq::lock::LockManager;
//!
//! let manager = LockManager::with_backend(config, OsBackend::new());
//! ```

pub mod mock;
pub mod os;
pub mod traits;

pub use mock::{MockBackend, MockHandle};
pub use os::{OsBackend, OsLockFile};
pub use traits::LockBackend;
