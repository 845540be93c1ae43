//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Flags
//!
//! - `--config <path>`: Config file (overrides `$FLOCKQ_CONFIG`)
//! - `--timeout <secs>`: Give up waiting for the lock
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Only log errors

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// flockq - Run a command while holding an advisory file lock
#[derive(Parser, Debug)]
#[command(name = "flockq")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
EXAMPLES:
    # Serialize database migrations across shells
    flockq /var/lock/migrate.lock -- ./migrate.sh

    # Wait at most 5 seconds for the lock
    flockq --timeout 5 /tmp/build.lock -- make

EXIT STATUS:
    The command's own exit status, 1 if the lock could not be taken,
    or 75 if --timeout expired first.")]
pub struct Cli {
    /// Config file; overrides $FLOCKQ_CONFIG
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Give up after waiting this many seconds (fractions allowed)
    #[arg(short, long, value_name = "SECS", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Enable debug logging
    #[arg(long, conflicts_with = "quiet")]
    pub debug: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Lock file to hold; created if missing
    #[arg(value_name = "LOCKFILE")]
    pub lockfile: PathBuf,

    /// Command to run while the lock is held
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Default log level implied by the flags.
    pub fn log_level(&self) -> tracing::Level {
        if self.debug {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::WARN
        }
    }
}

/// Parse a non-negative number of seconds.
fn parse_timeout(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid timeout '{}': {}", value, e))
}
