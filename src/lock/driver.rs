//! lock::driver
//!
//! The task that owns one [`LockRecord`] and moves it through its states.
//!
//! # Architecture
//!
//! Each path gets one driver task. Callers talk to it over an unbounded
//! channel, so a request is queued at the moment `acquire` is called and
//! requests for one path are seen in call order. The driver is the only
//! code that touches the record, so transitions never interleave.
//!
//! After every command the driver applies the dispatch rule: an idle record
//! with waiters starts a new attempt for the head waiter, unless that
//! waiter is sleeping out a retry delay.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, error, warn};

use super::errors::LockError;
use super::permit::LockPermit;
use super::record::{LockRecord, RecordSnapshot};
use super::retry::{RetryDecision, RetryPolicy};
use crate::backend::LockBackend;
use crate::core::paths::LockPath;
use crate::core::types::HolderToken;

/// A queued lock request's reply channel.
pub(crate) type Waiter = oneshot::Sender<Result<LockPermit, LockError>>;

/// Messages accepted by a record's driver.
#[derive(Debug)]
pub(crate) enum Command {
    /// Join the queue.
    Acquire(Waiter),
    /// Release the grant `token`; `reply` is `None` for dropped permits.
    Release {
        token: HolderToken,
        reply: Option<oneshot::Sender<Result<(), LockError>>>,
    },
    /// Report the record's state.
    Inspect(oneshot::Sender<RecordSnapshot>),
}

/// Settings shared by every driver of one manager.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DriverSettings {
    pub policy: RetryPolicy,
    pub file_mode: u32,
}

pub(crate) struct Driver<B: LockBackend> {
    record: LockRecord<B::Handle, Waiter>,
    backend: Arc<B>,
    settings: DriverSettings,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Used to hand permits a channel without keeping the driver alive.
    sender: mpsc::WeakUnboundedSender<Command>,
    /// When the head waiter may try again after contention.
    retry_at: Option<Instant>,
}

impl<B: LockBackend> Driver<B> {
    /// Start a driver for `path` on `runtime` and return its command channel.
    pub(crate) fn spawn(
        path: LockPath,
        backend: Arc<B>,
        settings: DriverSettings,
        runtime: &Handle,
    ) -> mpsc::UnboundedSender<Command> {
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = Driver {
            record: LockRecord::new(path),
            backend,
            settings,
            commands: rx,
            sender: tx.downgrade(),
            retry_at: None,
        };
        runtime.spawn(driver.run());
        tx
    }

    async fn run(mut self) {
        debug!(path = %self.record.path(), "lock record created");
        loop {
            if self.retry_at.is_none() && self.record.needs_dispatch() {
                self.dispatch().await;
                continue;
            }

            let command = match self.retry_at {
                Some(deadline) => tokio::select! {
                    _ = time::sleep_until(deadline) => {
                        self.retry_at = None;
                        continue;
                    }
                    command = self.commands.recv() => command,
                },
                None => self.commands.recv().await,
            };

            match command {
                Some(command) => self.handle(command).await,
                // Every manager and permit is gone.
                None => break,
            }
        }
        debug!(path = %self.record.path(), "lock record driver stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Acquire(waiter) => {
                self.record.enqueue(waiter);
                debug!(
                    path = %self.record.path(),
                    state = %self.record.state(),
                    waiting = self.record.waiting(),
                    "lock requested"
                );
            }
            Command::Release { token, reply } => {
                let result = self.release(token).await;
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(err) = result {
                            warn!(path = %self.record.path(), error = %err, "background release failed");
                        }
                    }
                }
            }
            Command::Inspect(reply) => {
                let _ = reply.send(self.record.snapshot(self.retry_at.is_some()));
            }
        }
    }

    /// Run one lock attempt for the head waiter.
    async fn dispatch(&mut self) {
        let Some(commands) = self.sender.upgrade() else {
            self.abandon_waiters();
            return;
        };

        self.record.begin_locking();
        let path = self.record.path().clone();
        debug!(path = %path, waiting = self.record.waiting(), "attempting lock");

        let handle = match self.backend.open(&path, self.settings.file_mode).await {
            Ok(handle) => handle,
            Err(source) => {
                warn!(path = %path, error = %source, "cannot open lock file");
                if let Some(waiter) = self.record.open_failed() {
                    let _ = waiter.send(Err(LockError::OpenFailure {
                        path: path.as_path().to_path_buf(),
                        source,
                    }));
                }
                return;
            }
        };

        let handle = self.record.opened(handle);
        let attempt = self.backend.try_lock_exclusive(handle).await;

        let source = match attempt {
            Ok(()) => {
                let (waiter, token) = self.record.grant();
                debug!(path = %path, token = %token, "lock granted");
                if let Some(waiter) = waiter {
                    // If the waiter is gone the returned permit drops here
                    // and releases itself.
                    let _ = waiter.send(Ok(LockPermit::new(path, token, commands)));
                }
                return;
            }
            Err(source) => source,
        };

        let decision = self.settings.policy.classify(&source);
        if let Some(handle) = self.record.handle_mut() {
            if let Err(close_err) = self.backend.close(handle).await {
                error!(
                    path = %path,
                    error = %close_err,
                    "failed to close lock file after failed lock attempt"
                );
                std::process::abort();
            }
        }
        self.record.attempt_failed();

        match decision {
            RetryDecision::Retry(delay) => {
                debug!(path = %path, error = %source, ?delay, "lock contended, retrying");
                self.retry_at = Some(Instant::now() + delay);
            }
            RetryDecision::Terminal => {
                warn!(path = %path, error = %source, "lock attempt failed");
                if let Some(waiter) = self.record.reject_head() {
                    let _ = waiter.send(Err(LockError::LockFailure {
                        path: path.as_path().to_path_buf(),
                        source,
                    }));
                }
            }
        }
    }

    /// `Locked → Unlocking → Unlocked` for the holder of `token`.
    async fn release(&mut self, token: HolderToken) -> Result<(), LockError> {
        if let Err(err) = self.record.begin_release(token) {
            error!(
                path = %self.record.path(),
                token = %token,
                state = %self.record.state(),
                "mismatched lock holder or already unlocked"
            );
            return Err(err);
        }

        let closed = match self.record.handle_mut() {
            Some(handle) => self.backend.close(handle).await,
            None => Ok(()),
        };
        self.record.finish_release();
        debug!(path = %self.record.path(), token = %token, "lock released");

        closed.map_err(|source| LockError::CloseFailure {
            path: self.record.path().as_path().to_path_buf(),
            source,
        })
    }

    /// Answer every queued waiter once no manager can hand out permits.
    fn abandon_waiters(&mut self) {
        while let Some(waiter) = self.record.reject_head() {
            let _ = waiter.send(Err(LockError::ManagerShutdown));
        }
    }
}
