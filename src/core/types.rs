//! core::types
//!
//! Strong types for lock-manager domain concepts.
//!
//! # Types
//!
//! - [`HolderToken`] - Opaque identifier of one lock grant
//! - [`LockState`] - Per-path lock record state
//!
//! # Examples
//!
//! ```
//! use flockq::core::types::HolderToken;
//!
//! let a = HolderToken::mint();
//! let b = HolderToken::mint();
//! assert!(b > a);
//! ```

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

/// Next token value to hand out. Shared by every record in the process.
static NEXT_HOLDER: AtomicU64 = AtomicU64::new(1);

/// An opaque identifier for one lock grant.
///
/// Tokens are minted when a lock is granted and are strictly increasing
/// across the whole process, so two grants (even on different paths) never
/// share a token. A token only identifies a grant; it does not confer the
/// right to release. That right lives in [`crate::lock::LockPermit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HolderToken(NonZeroU64);

impl HolderToken {
    /// Mint a fresh token, greater than every token minted before it.
    pub fn mint() -> Self {
        let raw = NEXT_HOLDER.fetch_add(1, Ordering::Relaxed);
        // The counter starts at 1 and would need 2^64 grants to wrap.
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Get the raw numeric value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for HolderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State of a per-path lock record.
///
/// `Locking` and `Unlocking` only exist while an I/O operation is in
/// flight. Callers never observe them through a grant; they show up in
/// [`crate::lock::RecordSnapshot`] for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    /// No handle is open and nobody holds the lock.
    #[default]
    Unlocked,
    /// The backing file is being opened and locked for the head waiter.
    Locking,
    /// A permit holder owns the lock.
    Locked,
    /// The holder released; the handle is being closed.
    Unlocking,
}

impl LockState {
    /// Get the string representation of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Unlocked => "unlocked",
            LockState::Locking => "locking",
            LockState::Locked => "locked",
            LockState::Unlocking => "unlocking",
        }
    }

    /// Whether a record in this state always owns an open handle.
    ///
    /// `Locking` owns one only after the open succeeds, so it reports `false`.
    pub fn has_handle(&self) -> bool {
        matches!(self, LockState::Locked | LockState::Unlocking)
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
