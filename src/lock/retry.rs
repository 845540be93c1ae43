//! lock::retry
//!
//! Classification of failed lock attempts.
//!
//! A lock attempt that fails with a contention-style error is retried after
//! a fixed delay. Everything else is terminal and goes back to the waiter.
//!
//! There is no backoff and no attempt ceiling: a path held forever by
//! another process is retried forever. Callers that need a bound wrap the
//! acquisition in a timeout.

use std::io;
use std::time::Duration;

use crate::core::config::DEFAULT_RETRY_DELAY;

/// What to do after a failed lock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Close the handle and try the same waiter again after the delay.
    Retry(Duration),
    /// Report the error to the waiter.
    Terminal,
}

/// Fixed-delay retry policy for lock contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Create a policy that waits `delay` between attempts.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// The delay between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Classify a lock-attempt error.
    ///
    /// # Example
    ///
    /// ```
    /// use flockq::lock::{RetryDecision, RetryPolicy};
    /// use std::io;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new(Duration::from_millis(250));
    /// let busy = io::Error::from(io::ErrorKind::WouldBlock);
    /// assert_eq!(policy.classify(&busy), RetryDecision::Retry(Duration::from_millis(250)));
    ///
    /// let denied = io::Error::from(io::ErrorKind::PermissionDenied);
    /// assert_eq!(policy.classify(&denied), RetryDecision::Terminal);
    /// ```
    pub fn classify(&self, err: &io::Error) -> RetryDecision {
        if is_transient(err) {
            RetryDecision::Retry(self.delay)
        } else {
            RetryDecision::Terminal
        }
    }
}

/// Whether a lock error is expected to clear on its own.
///
/// Transient: EAGAIN/EWOULDBLOCK (held elsewhere), ENOLCK (kernel lock table
/// full), EDEADLK (deadlock avoided; not permanent when several lock files
/// are in play), and whatever `fs2` reports for contention on this platform.
pub fn is_transient(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    let Some(code) = err.raw_os_error() else {
        return false;
    };

    if Some(code) == fs2::lock_contended_error().raw_os_error() {
        return true;
    }

    #[cfg(unix)]
    {
        if code == libc::EAGAIN
            || code == libc::EWOULDBLOCK
            || code == libc::ENOLCK
            || code == libc::EDEADLK
        {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delay_is_250ms() {
        assert_eq!(RetryPolicy::default().delay(), Duration::from_millis(250));
    }

    #[test]
    fn would_block_kind_is_transient() {
        assert!(is_transient(&io::ErrorKind::WouldBlock.into()));
    }

    #[test]
    fn contended_error_is_transient() {
        assert!(is_transient(&fs2::lock_contended_error()));
    }

    #[cfg(unix)]
    #[test]
    fn unix_retry_codes_are_transient() {
        for code in [libc::EAGAIN, libc::EWOULDBLOCK, libc::ENOLCK, libc::EDEADLK] {
            let err = io::Error::from_raw_os_error(code);
            assert!(is_transient(&err), "errno {} should retry", code);
        }
    }

    #[cfg(unix)]
    #[test]
    fn other_codes_are_terminal() {
        for code in [libc::EBADF, libc::EINVAL, libc::EPERM, libc::EIO] {
            let err = io::Error::from_raw_os_error(code);
            assert!(!is_transient(&err), "errno {} should not retry", code);
        }
    }

    #[test]
    fn errors_without_code_are_terminal() {
        assert!(!is_transient(&io::Error::other("boom")));
        assert!(!is_transient(&io::ErrorKind::PermissionDenied.into()));
    }

    #[test]
    fn classify_uses_configured_delay() {
        let policy = RetryPolicy::new(Duration::from_millis(5));
        assert_eq!(
            policy.classify(&io::ErrorKind::WouldBlock.into()),
            RetryDecision::Retry(Duration::from_millis(5))
        );
        assert_eq!(
            policy.classify(&io::ErrorKind::InvalidInput.into()),
            RetryDecision::Terminal
        );
    }
}
