//! lock::manager
//!
//! The registry of lock records and the public entry point.
//!
//! # Architecture
//!
//! `LockManager` maps each normalized [`LockPath`] to the command channel of
//! exactly one record driver. Records are created on first use and never
//! removed, which suits the usual case of a small, fixed set of lock files.
//! If a record's driver has died with its runtime, the next request for that
//! path starts a fresh record.
//!
//! # Example
//!
//! ```no_run
//! use flockq::core::config::Config;
//! use flockq::lock::LockManager;
//!
//! # async fn run() -> Result<(), flockq::lock::LockError> {
//! let manager = LockManager::new(&Config::default());
//!
//! let permit = manager.acquire("/var/lock/app.lock").await?;
//! // ... exclusive section ...
//! manager.release(permit).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::driver::{Command, Driver, DriverSettings};
use super::errors::LockError;
use super::permit::{LockPermit, PendingLock};
use super::record::RecordSnapshot;
use super::retry::RetryPolicy;
use crate::backend::{LockBackend, OsBackend};
use crate::core::config::Config;
use crate::core::paths::LockPath;

static GLOBAL: OnceLock<LockManager> = OnceLock::new();

/// Queued advisory lock manager.
///
/// Requests for the same path are granted one at a time in call order.
/// Requests for different paths never wait on each other.
#[derive(Debug)]
pub struct LockManager<B = OsBackend> {
    backend: Arc<B>,
    settings: DriverSettings,
    records: Mutex<HashMap<LockPath, mpsc::UnboundedSender<Command>>>,
}

impl LockManager<OsBackend> {
    /// Create a manager that locks real files.
    pub fn new(config: &Config) -> Self {
        Self::with_backend(config, OsBackend::new())
    }

    /// The process-wide manager.
    ///
    /// Configured from `$FLOCKQ_CONFIG` on first use; an unreadable or
    /// invalid config falls back to defaults with a warning.
    pub fn global() -> &'static LockManager {
        GLOBAL.get_or_init(|| {
            let config = Config::load(None).unwrap_or_else(|e| {
                warn!(error = %e, "ignoring lock manager config");
                Config::default()
            });
            LockManager::new(&config)
        })
    }
}

impl<B: LockBackend> LockManager<B> {
    /// Create a manager over an arbitrary backend.
    pub fn with_backend(config: &Config, backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            settings: DriverSettings {
                policy: RetryPolicy::new(config.retry_delay()),
                file_mode: config.file_mode(),
            },
            records: Mutex::new(HashMap::new()),
        }
    }

    /// The backend this manager drives.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The retry policy applied to contended paths.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.settings.policy
    }

    /// Queue a request for the lock on `path`.
    ///
    /// The request is queued before this returns; awaiting the result
    /// yields a [`LockPermit`] once every earlier request for the same path
    /// has been served. Contention with other processes is retried without
    /// limit.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// The future resolves to:
    /// - [`LockError::InvalidPath`] if `path` cannot be normalized
    /// - [`LockError::OpenFailure`] if the lock file cannot be created
    /// - [`LockError::LockFailure`] for non-contention lock errors
    /// - [`LockError::NoRuntime`] outside a tokio runtime
    pub fn acquire(&self, path: impl AsRef<Path>) -> PendingLock {
        let path = match LockPath::new(path) {
            Ok(path) => path,
            Err(e) => return PendingLock::ready(Err(e.into())),
        };

        let commands = match self.lookup_or_create(&path) {
            Ok(commands) => commands,
            Err(e) => return PendingLock::ready(Err(e)),
        };

        let (tx, rx) = oneshot::channel();
        // On failure `tx` is dropped and the request reads as shut down.
        let _ = commands.send(Command::Acquire(tx));
        PendingLock::new(rx)
    }

    /// Release a permit. Equivalent to [`LockPermit::release`].
    pub async fn release(&self, permit: LockPermit) -> Result<(), LockError> {
        permit.release().await
    }

    /// Snapshot the record for `path`, if one exists.
    pub async fn inspect(&self, path: impl AsRef<Path>) -> Option<RecordSnapshot> {
        let path = LockPath::new(path).ok()?;
        let commands = self.records().get(&path).cloned()?;

        let (tx, rx) = oneshot::channel();
        commands.send(Command::Inspect(tx)).ok()?;
        rx.await.ok()
    }

    /// Number of paths that have a record.
    pub fn tracked_paths(&self) -> usize {
        self.records().len()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<LockPath, mpsc::UnboundedSender<Command>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Find the record for `path`, creating it on first use.
    fn lookup_or_create(
        &self,
        path: &LockPath,
    ) -> Result<mpsc::UnboundedSender<Command>, LockError> {
        let mut records = self.records();
        if let Some(commands) = records.get(path) {
            if !commands.is_closed() {
                return Ok(commands.clone());
            }
            debug!(path = %path, "lock record driver gone, recreating");
        }

        let runtime = Handle::try_current().map_err(|_| LockError::NoRuntime)?;
        let commands = Driver::spawn(
            path.clone(),
            Arc::clone(&self.backend),
            self.settings,
            &runtime,
        );
        records.insert(path.clone(), commands.clone());
        Ok(commands)
    }

    /// Send a raw release for `token` on `path`, bypassing the permit.
    #[cfg(test)]
    async fn release_token(
        &self,
        path: &LockPath,
        token: crate::core::types::HolderToken,
    ) -> Result<(), LockError> {
        let commands = self
            .records()
            .get(path)
            .cloned()
            .ok_or(LockError::ManagerShutdown)?;
        super::permit::send_release(&commands, token).await
    }
}
