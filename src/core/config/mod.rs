//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. `$FLOCKQ_CONFIG` if set and the file exists
//! 3. An explicit config path (the CLI's `--config`)
//!
//! # Example
//!
//! ```no_run
//! use flockq::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/etc/flockq.toml"))).unwrap();
//! println!("retry delay: {:?}", config.retry_delay());
//! println!("file mode: {:o}", config.file_mode());
//! ```

pub mod schema;

pub use schema::{FileConfig, DEFAULT_FILE_MODE, DEFAULT_RETRY_DELAY};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Environment variable naming an optional config file.
pub const CONFIG_ENV: &str = "FLOCKQ_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Resolved lock manager configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    file: FileConfig,
    /// Files that contributed, in load order
    sources: Vec<PathBuf>,
}

impl Config {
    /// Build a config directly from file values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the values fail validation.
    pub fn from_file_config(file: FileConfig) -> Result<Self, ConfigError> {
        file.validate()?;
        Ok(Self {
            file,
            sources: Vec::new(),
        })
    }

    /// Load configuration from `$FLOCKQ_CONFIG` and an optional explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed,
    /// or validated, or if `explicit` does not exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut merged = FileConfig::default();
        let mut sources = Vec::new();

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                merged = merged.merge(Self::read_file(&path)?);
                sources.push(path);
            } else {
                debug!(path = %path.display(), "{} names a missing file, skipping", CONFIG_ENV);
            }
        }

        if let Some(path) = explicit {
            merged = merged.merge(Self::read_file(path)?);
            sources.push(path.to_path_buf());
        }

        merged.validate()?;
        Ok(Self {
            file: merged,
            sources,
        })
    }

    /// Read and parse one config file.
    fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let parsed: FileConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Delay between attempts on a contended lock.
    pub fn retry_delay(&self) -> Duration {
        self.file
            .retry_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RETRY_DELAY)
    }

    /// Permission bits for newly created lock files.
    pub fn file_mode(&self) -> u32 {
        self.file.file_mode.unwrap_or(DEFAULT_FILE_MODE)
    }

    /// Files that contributed to this config, in load order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}
