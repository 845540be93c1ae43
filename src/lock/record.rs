//! lock::record
//!
//! Per-path lock record state machine.
//!
//! # States
//!
//! ```text
//!            begin_locking            grant
//! Unlocked ───────────────► Locking ─────────► Locked
//!    ▲                         │                  │
//!    │  open_failed /          │                  │ begin_release
//!    │  attempt_failed         │                  ▼
//!    ◄─────────────────────────┘              Unlocking
//!    ▲                                            │
//!    └────────────── finish_release ◄─────────────┘
//! ```
//!
//! # Invariants
//!
//! - A handle is present only while `Locking` (after open), `Locked`, or
//!   `Unlocking`
//! - A holder token is present iff the state is `Locked`
//! - A waiter leaves the queue only when it gets its answer
//!
//! The record performs no I/O. The driver calls a transition, performs the
//! I/O it implies, and reports back. Transitions the driver gets wrong are
//! caught by debug assertions; releases from outside are checked against
//! the holder token in every build.

use std::collections::VecDeque;

use crate::core::paths::LockPath;
use crate::core::types::{HolderToken, LockState};

use super::errors::LockError;

/// Point-in-time view of a lock record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSnapshot {
    /// Normalized lock path.
    pub path: LockPath,
    /// Current state.
    pub state: LockState,
    /// Number of queued waiters, including the one being served.
    pub waiting: usize,
    /// Token of the current holder, if `Locked`.
    pub holder: Option<HolderToken>,
    /// Whether the head waiter is sleeping before another attempt.
    pub retry_pending: bool,
}

/// Lock state for one path.
///
/// Generic over the backend handle `H` and the waiter `W` so the
/// transitions can be exercised without a runtime.
#[derive(Debug)]
pub struct LockRecord<H, W> {
    path: LockPath,
    state: LockState,
    waiters: VecDeque<W>,
    handle: Option<H>,
    holder: Option<HolderToken>,
}

impl<H, W> LockRecord<H, W> {
    /// Create an idle record for `path`.
    pub fn new(path: LockPath) -> Self {
        Self {
            path,
            state: LockState::Unlocked,
            waiters: VecDeque::new(),
            handle: None,
            holder: None,
        }
    }

    /// The normalized lock path.
    pub fn path(&self) -> &LockPath {
        &self.path
    }

    /// Current state.
    pub fn state(&self) -> LockState {
        self.state
    }

    /// Token of the current holder.
    pub fn holder(&self) -> Option<HolderToken> {
        self.holder
    }

    /// Number of queued waiters.
    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }

    /// Whether a handle is currently owned.
    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Append a waiter to the queue.
    pub fn enqueue(&mut self, waiter: W) {
        self.waiters.push_back(waiter);
    }

    /// Whether the record is idle with someone waiting.
    pub fn needs_dispatch(&self) -> bool {
        self.state == LockState::Unlocked && !self.waiters.is_empty()
    }

    /// `Unlocked → Locking` for the head waiter.
    pub fn begin_locking(&mut self) {
        debug_assert!(self.needs_dispatch(), "begin_locking on {:?}", self.state);
        debug_assert!(self.handle.is_none());
        self.state = LockState::Locking;
    }

    /// The open failed: back to `Unlocked`, handing back the head waiter.
    pub fn open_failed(&mut self) -> Option<W> {
        debug_assert_eq!(self.state, LockState::Locking);
        debug_assert!(self.handle.is_none());
        self.state = LockState::Unlocked;
        self.check_handle();
        self.waiters.pop_front()
    }

    /// The open succeeded; the record now owns `handle`.
    pub fn opened(&mut self, handle: H) -> &mut H {
        debug_assert_eq!(self.state, LockState::Locking);
        debug_assert!(self.handle.is_none());
        self.handle.insert(handle)
    }

    /// The owned handle, for I/O on it.
    pub fn handle_mut(&mut self) -> Option<&mut H> {
        self.handle.as_mut()
    }

    /// `Locking → Locked`: mint a token and hand back the head waiter.
    pub fn grant(&mut self) -> (Option<W>, HolderToken) {
        debug_assert_eq!(self.state, LockState::Locking);
        debug_assert!(self.holder.is_none());

        let token = HolderToken::mint();
        self.state = LockState::Locked;
        self.check_handle();
        self.holder = Some(token);
        (self.waiters.pop_front(), token)
    }

    /// `Locking → Unlocked` after the failed attempt's handle was closed.
    ///
    /// The head waiter stays queued; see [`Self::reject_head`].
    pub fn attempt_failed(&mut self) -> Option<H> {
        debug_assert_eq!(self.state, LockState::Locking);
        self.state = LockState::Unlocked;
        let handle = self.handle.take();
        self.check_handle();
        handle
    }

    /// Dequeue the head waiter to give it a terminal error.
    pub fn reject_head(&mut self) -> Option<W> {
        debug_assert_eq!(self.state, LockState::Unlocked);
        self.waiters.pop_front()
    }

    /// `Locked → Unlocking` on behalf of the holder of `token`.
    ///
    /// # Errors
    ///
    /// [`LockError::HolderMismatch`] if `token` is not the current holder
    /// (stale, already released) or the record is not `Locked`. The record
    /// is left untouched.
    pub fn begin_release(&mut self, token: HolderToken) -> Result<(), LockError> {
        if self.state != LockState::Locked || self.holder != Some(token) {
            return Err(LockError::HolderMismatch {
                path: self.path.as_path().to_path_buf(),
            });
        }

        self.holder = None;
        self.state = LockState::Unlocking;
        self.check_handle();
        Ok(())
    }

    /// `Unlocking → Unlocked` once the handle is closed.
    pub fn finish_release(&mut self) -> Option<H> {
        debug_assert_eq!(self.state, LockState::Unlocking);
        self.state = LockState::Unlocked;
        let handle = self.handle.take();
        self.check_handle();
        handle
    }

    /// Point-in-time view of the record.
    pub fn snapshot(&self, retry_pending: bool) -> RecordSnapshot {
        RecordSnapshot {
            path: self.path.clone(),
            state: self.state,
            waiting: self.waiters.len(),
            holder: self.holder,
            retry_pending,
        }
    }

    /// Handle ownership must match the state after every settled transition.
    fn check_handle(&self) {
        debug_assert_eq!(
            self.handle.is_some(),
            self.state.has_handle(),
            "{} record {} a handle",
            self.state,
            if self.handle.is_some() { "owns" } else { "lacks" }
        );
    }
}
