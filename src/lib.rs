//! flockq - Queued advisory file locks for async Rust
//!
//! flockq serializes requests for exclusive access to a named file within
//! one process. Each path gets a FIFO queue of waiters; the head waiter's
//! request is turned into an OS advisory lock (`flock` on Unix) on the
//! backing file, retried on contention, and handed back as a
//! [`lock::LockPermit`] that releases the lock when consumed or dropped.
//!
//! # Architecture
//!
//! - [`lock`] - Registry, per-path state machine, driver tasks, permits
//! - [`backend`] - Filesystem and advisory-lock facilities (real and mock)
//! - [`core`] - Path normalization, tokens and states, configuration
//! - [`cli`] - The `flockq` command: run a command while holding a lock
//!
//! # Correctness Invariants
//!
//! 1. At most one holder per path at any time
//! 2. Waiters on one path are served in call order, even across retries
//! 3. A release that names anything but the current holder is rejected
//!    without touching the record
//! 4. A failed release still returns the path to idle

pub mod backend;
pub mod cli;
pub mod core;
pub mod lock;
