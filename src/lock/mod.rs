//! lock
//!
//! Queued advisory locks on named files.
//!
//! # Modules
//!
//! - [`manager`] - Registry of per-path records; the public entry point
//! - [`record`] - Per-path state machine
//! - `driver` - Task that owns a record and performs its I/O
//! - [`retry`] - Transient vs. terminal lock-attempt failures
//! - [`permit`] - Pending requests and granted permits
//! - [`errors`] - Error taxonomy
//!
//! # Guarantees
//!
//! - At most one permit per path is live at a time within a manager
//! - Requests for one path are granted in call order, including across
//!   retries: a contended head waiter keeps its place
//! - Different paths are independent
//! - Waiting has no timeout and cannot be cancelled; wrap the
//!   [`PendingLock`] in `tokio::time::timeout` if a bound is needed

mod driver;
pub mod errors;
pub mod manager;
pub mod permit;
pub mod record;
pub mod retry;

pub use errors::LockError;
pub use manager::LockManager;
pub use permit::{LockPermit, PendingLock};
pub use record::{LockRecord, RecordSnapshot};
pub use retry::{is_transient, RetryDecision, RetryPolicy};
