//! cli
//!
//! Command-line interface for flockq.
//!
//! # Responsibilities
//!
//! - Parse arguments and load configuration
//! - Take the lock through [`crate::lock::LockManager`], bounded by
//!   `--timeout` if given
//! - Run the command, release the lock, and pass on the exit status
//!
//! The timeout lives here rather than in the lock manager: an expired wait
//! simply abandons the pending request.

pub mod args;

pub use args::Cli;

use std::process::ExitStatus;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::lock::LockManager;

/// Exit status when the lock could not be taken or the command not run.
pub const EXIT_FAILURE: u8 = 1;

/// Exit status when `--timeout` expired (`EX_TEMPFAIL`).
pub const EXIT_TIMEOUT: u8 = 75;

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins over the level implied by `--debug`/`--quiet`.
pub fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().as_str()));

    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the CLI application and return the process exit status.
///
/// This is the main entry point called from `main.rs`.
pub async fn run(cli: Cli) -> Result<u8> {
    let config = Config::load(cli.config.as_deref()).context("failed to load config")?;
    let manager = LockManager::new(&config);

    let pending = manager.acquire(&cli.lockfile);
    let acquired = match cli.timeout {
        Some(limit) => match tokio::time::timeout(limit, pending).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    path = %cli.lockfile.display(),
                    ?limit,
                    "timed out waiting for lock"
                );
                return Ok(EXIT_TIMEOUT);
            }
        },
        None => pending.await,
    };
    let permit =
        acquired.with_context(|| format!("cannot lock '{}'", cli.lockfile.display()))?;
    info!(path = %permit.path(), token = %permit.token(), "lock acquired");

    let (program, args) = cli
        .command
        .split_first()
        .context("no command given")?;
    let status = Command::new(program).args(args).status().await;

    // Release before reporting a spawn error so the lock never outlives us.
    let released = permit.release().await;
    let status = status.with_context(|| format!("failed to run '{}'", program))?;
    released.context("failed to release lock")?;

    Ok(exit_code(status))
}

/// Map a child's exit status to ours; signals map to `128 + signo`.
fn exit_code(status: ExitStatus) -> u8 {
    if let Some(code) = status.code() {
        return (code & 0xff) as u8;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128u8.wrapping_add((signal & 0x7f) as u8);
        }
    }

    EXIT_FAILURE
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn exit_code_passes_through() {
        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
    }

    #[test]
    fn exit_code_for_signal() {
        // SIGKILL
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
    }
}
