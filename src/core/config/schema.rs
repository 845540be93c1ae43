//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Config values are validated after parsing: the retry delay must be
//! positive and the file mode must fit in permission bits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default delay between attempts on a contended lock (250ms).
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Default permission bits for newly created lock files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Highest accepted permission value (setuid/setgid/sticky + rwx).
const MAX_FILE_MODE: u32 = 0o7777;

/// Lock manager configuration file.
///
/// # Example
///
/// ```toml
/// retry_delay_ms = 250
/// file_mode = 420  # 0o644
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Fixed delay between lock attempts on a contended path
    pub retry_delay_ms: Option<u64>,

    /// Permission bits used when creating a lock file
    pub file_mode: Option<u32>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_delay_ms == Some(0) {
            return Err(ConfigError::InvalidValue(
                "retry_delay_ms must be greater than zero".to_string(),
            ));
        }

        if let Some(mode) = self.file_mode {
            if mode > MAX_FILE_MODE {
                return Err(ConfigError::InvalidValue(format!(
                    "file_mode {:#o} exceeds {:#o}",
                    mode, MAX_FILE_MODE
                )));
            }
        }

        Ok(())
    }

    /// Overlay `other` on top of `self`; set fields in `other` win.
    pub fn merge(self, other: FileConfig) -> FileConfig {
        FileConfig {
            retry_delay_ms: other.retry_delay_ms.or(self.retry_delay_ms),
            file_mode: other.file_mode.or(self.file_mode),
        }
    }
}
