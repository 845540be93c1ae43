//! core
//!
//! Core domain types and configuration for flockq.
//!
//! # Modules
//!
//! - [`types`] - Strong types: HolderToken, LockState
//! - [`paths`] - Normalized lock-file paths
//! - [`config`] - Configuration schema and loading

pub mod config;
pub mod paths;
pub mod types;
