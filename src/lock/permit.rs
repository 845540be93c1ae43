//! lock::permit
//!
//! The caller-facing halves of a lock request: the [`PendingLock`] future
//! and the [`LockPermit`] it resolves to.
//!
//! # Invariants
//!
//! - A `LockPermit` is not `Clone`; `release` consumes it, so a grant can
//!   be released at most once through its permit
//! - A permit dropped without `release` is released in the background
//!   (RAII pattern); close errors are then only logged

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::driver::Command;
use super::errors::LockError;
use crate::core::paths::LockPath;
use crate::core::types::HolderToken;

/// A queued lock request.
///
/// The request joins its path's queue when [`crate::lock::LockManager::acquire`]
/// is called, not when this future is first polled. Dropping it does not
/// withdraw the request: the record still serves it in turn and immediately
/// releases the unclaimed grant.
#[derive(Debug)]
#[must_use = "the lock is only observable by awaiting the pending request"]
pub struct PendingLock {
    rx: oneshot::Receiver<Result<LockPermit, LockError>>,
}

impl PendingLock {
    pub(crate) fn new(rx: oneshot::Receiver<Result<LockPermit, LockError>>) -> Self {
        Self { rx }
    }

    /// A request that has already been answered.
    pub(crate) fn ready(result: Result<LockPermit, LockError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

impl Future for PendingLock {
    type Output = Result<LockPermit, LockError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|answer| answer.unwrap_or(Err(LockError::ManagerShutdown)))
    }
}

/// Proof of holding the advisory lock on one path.
///
/// # Example
///
/// ```ignore
/// let permit = manager.acquire("/var/lock/app.lock").await?;
/// // ... exclusive section ...
/// permit.release().await?;
/// ```
#[derive(Debug)]
#[must_use = "dropping a permit releases the lock"]
pub struct LockPermit {
    path: LockPath,
    token: HolderToken,
    /// Channel to the record's driver; `None` once released.
    commands: Option<mpsc::UnboundedSender<Command>>,
}

impl LockPermit {
    pub(crate) fn new(
        path: LockPath,
        token: HolderToken,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self {
            path,
            token,
            commands: Some(commands),
        }
    }

    /// The normalized path this permit locks.
    pub fn path(&self) -> &LockPath {
        &self.path
    }

    /// The token minted for this grant.
    pub fn token(&self) -> HolderToken {
        self.token
    }

    /// Unlock and close the backing file, then let the next waiter in.
    ///
    /// # Errors
    ///
    /// - [`LockError::CloseFailure`] if closing the file failed; the path
    ///   is still unlocked for the next waiter
    /// - [`LockError::ManagerShutdown`] if the runtime driving the record
    ///   is gone
    pub async fn release(mut self) -> Result<(), LockError> {
        match self.commands.take() {
            Some(commands) => send_release(&commands, self.token).await,
            // Only `release` and `Drop` take the channel.
            None => Ok(()),
        }
    }
}

impl Drop for LockPermit {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.take() {
            debug!(path = %self.path, token = %self.token, "permit dropped, releasing");
            let _ = commands.send(Command::Release {
                token: self.token,
                reply: None,
            });
        }
    }
}

/// Ask the record's driver to release the grant `token`.
pub(crate) async fn send_release(
    commands: &mpsc::UnboundedSender<Command>,
    token: HolderToken,
) -> Result<(), LockError> {
    let (tx, rx) = oneshot::channel();
    commands
        .send(Command::Release {
            token,
            reply: Some(tx),
        })
        .map_err(|_| LockError::ManagerShutdown)?;
    rx.await.unwrap_or(Err(LockError::ManagerShutdown))
}
