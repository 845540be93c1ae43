//! Retry and failure-path tests using the mock backend.
//!
//! The mock never suspends, so these run under a paused clock and the
//! retry delay can be asserted exactly.

use std::io;
use std::time::Duration;

use flockq::backend::MockBackend;
use flockq::core::config::Config;
use flockq::core::paths::LockPath;
use flockq::core::types::LockState;
use flockq::lock::{LockError, LockManager};
use tokio::time::Instant;

const DELAY: Duration = Duration::from_millis(250);

fn manager() -> LockManager<MockBackend> {
    LockManager::with_backend(&Config::default(), MockBackend::new())
}

/// Assert that `expected` (and less than one more millisecond) has passed.
fn assert_waited(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(1),
        "waited {:?}, expected {:?}",
        elapsed,
        expected
    );
}

fn path(name: &str) -> LockPath {
    LockPath::new(format!("/mock/{}", name)).expect("lock path")
}

#[tokio::test(start_paused = true)]
async fn transient_error_retries_once_after_delay() {
    let manager = manager();
    let x = path("transient.lock");
    manager
        .backend()
        .fail_next_lock(&x, io::ErrorKind::WouldBlock.into());

    let start = Instant::now();
    let a = manager.acquire(x.as_path());
    let b = manager.acquire(x.as_path());

    let a = a.await.expect("A is granted after the retry");
    assert_waited(start, DELAY);
    assert_eq!(manager.backend().lock_attempts(&x), 2);
    // The failed attempt's handle was closed before retrying.
    assert_eq!(manager.backend().open_handles(&x), 1);

    // B queued behind A and was never attempted.
    let snapshot = manager.inspect(x.as_path()).await.expect("record");
    assert_eq!(snapshot.state, LockState::Locked);
    assert_eq!(snapshot.holder, Some(a.token()));
    assert_eq!(snapshot.waiting, 1);

    let a_token = a.token();
    a.release().await.expect("release A");
    let b = b.await.expect("B is granted");
    assert!(b.token() > a_token);
    assert_eq!(manager.backend().lock_attempts(&x), 3);
    b.release().await.expect("release B");
}

#[cfg(unix)]
#[tokio::test(start_paused = true)]
async fn deadlock_and_no_locks_errors_are_retried() {
    let manager = manager();
    let x = path("errno.lock");
    manager
        .backend()
        .fail_next_lock(&x, io::Error::from_raw_os_error(libc::EDEADLK));
    manager
        .backend()
        .fail_next_lock(&x, io::Error::from_raw_os_error(libc::ENOLCK));

    let start = Instant::now();
    let permit = manager.acquire(x.as_path()).await.expect("granted");
    assert_waited(start, DELAY * 2);
    assert_eq!(manager.backend().lock_attempts(&x), 3);
    permit.release().await.expect("release");
}

#[tokio::test(start_paused = true)]
async fn retrying_waiter_keeps_its_place() {
    let manager = manager();
    let x = path("held.lock");
    manager.backend().hold_externally(&x);

    let first = manager.acquire(x.as_path());
    tokio::time::sleep(Duration::from_secs(1)).await;
    let second = manager.acquire(x.as_path());
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Retried every 250ms for two seconds with no ceiling.
    assert!(manager.backend().lock_attempts(&x) >= 8);

    let snapshot = manager.inspect(x.as_path()).await.expect("record");
    assert_eq!(snapshot.state, LockState::Unlocked);
    assert_eq!(snapshot.waiting, 2);
    assert!(snapshot.retry_pending);
    assert!(snapshot.holder.is_none());

    manager.backend().release_externally(&x);

    let first = first.await.expect("first requester wins");
    let snapshot = manager.inspect(x.as_path()).await.expect("record");
    assert_eq!(snapshot.holder, Some(first.token()));
    assert_eq!(snapshot.waiting, 1);

    first.release().await.expect("release first");
    let second = second.await.expect("second requester follows");
    second.release().await.expect("release second");
}

#[tokio::test(start_paused = true)]
async fn terminal_error_fails_only_head_waiter() {
    let manager = manager();
    let x = path("terminal.lock");
    manager
        .backend()
        .fail_next_lock(&x, io::ErrorKind::PermissionDenied.into());

    let start = Instant::now();
    let a = manager.acquire(x.as_path());
    let b = manager.acquire(x.as_path());

    let err = a.await.unwrap_err();
    assert!(matches!(err, LockError::LockFailure { .. }), "got {err:?}");

    let b = b.await.expect("B is driven normally");
    assert_waited(start, Duration::ZERO);
    assert_eq!(manager.backend().lock_attempts(&x), 2);
    assert_eq!(manager.backend().open_handles(&x), 1);
    b.release().await.expect("release B");
}

#[tokio::test(start_paused = true)]
async fn open_error_fails_head_and_record_goes_idle() {
    let manager = manager();
    let x = path("open.lock");
    manager
        .backend()
        .fail_next_open(&x, io::ErrorKind::NotFound.into());

    let err = manager.acquire(x.as_path()).await.unwrap_err();
    assert!(matches!(err, LockError::OpenFailure { .. }));
    assert_eq!(manager.backend().lock_attempts(&x), 0);

    let snapshot = manager.inspect(x.as_path()).await.expect("record");
    assert_eq!(snapshot.state, LockState::Unlocked);
    assert_eq!(snapshot.waiting, 0);

    let permit = manager.acquire(x.as_path()).await.expect("next acquire");
    permit.release().await.expect("release");
}

#[tokio::test(start_paused = true)]
async fn close_failure_goes_to_releaser_and_path_stays_usable() {
    let manager = manager();
    let x = path("close.lock");

    let a = manager.acquire(x.as_path()).await.expect("A");
    let b = manager.acquire(x.as_path());
    manager
        .backend()
        .fail_next_close(&x, io::Error::other("EIO"));

    let err = a.release().await.unwrap_err();
    assert!(matches!(err, LockError::CloseFailure { .. }), "got {err:?}");

    // The queue is unaffected by the releaser's close error.
    let b = b.await.expect("B is granted");
    b.release().await.expect("release B");

    let snapshot = manager.inspect(x.as_path()).await.expect("record");
    assert_eq!(snapshot.state, LockState::Unlocked);
}

#[tokio::test(start_paused = true)]
async fn contended_path_does_not_delay_other_paths() {
    let manager = manager();
    let busy = path("busy.lock");
    let free = path("free.lock");
    manager.backend().hold_externally(&busy);

    let _stuck = manager.acquire(busy.as_path());

    let start = Instant::now();
    let permit = manager.acquire(free.as_path()).await.expect("free path");
    assert_waited(start, Duration::ZERO);
    permit.release().await.expect("release");
}

#[tokio::test(start_paused = true)]
async fn configured_delay_is_used() {
    let config = Config::from_file_config(flockq::core::config::FileConfig {
        retry_delay_ms: Some(40),
        ..Default::default()
    })
    .expect("config");
    let manager = LockManager::with_backend(&config, MockBackend::new());
    let x = path("configured.lock");
    manager
        .backend()
        .fail_next_lock(&x, io::ErrorKind::WouldBlock.into());

    let start = Instant::now();
    let permit = manager.acquire(x.as_path()).await.expect("granted");
    assert_waited(start, Duration::from_millis(40));
    assert_eq!(manager.retry_policy().delay(), Duration::from_millis(40));
    permit.release().await.expect("release");
}
