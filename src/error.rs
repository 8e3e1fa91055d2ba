//! Error types for teelog
//!
//! Every failure in the interception path maps to one of these categories so callers
//! (and tests) can tell a configuration problem from a broken sink or a skipped
//! retention entry. None of them is ever allowed to take the host process down.

use std::path::PathBuf;

use thiserror::Error;

/// Problems found while validating or loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A strftime pattern contains an unknown or malformed specifier
    #[error("invalid {field} format '{pattern}'")]
    InvalidFormat {
        field: &'static str,
        pattern: String,
    },

    /// The line template refers to something other than `{timestamp}` or `{message}`
    #[error("unknown placeholder '{{{name}}}' in line template")]
    UnknownPlaceholder { name: String },

    /// The line template has a `{` or `}` that is neither a placeholder nor escaped
    #[error("unbalanced brace at byte {position} in line template")]
    UnbalancedBrace { position: usize },

    #[error("unsupported file encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("invalid timezone '{0}' (expected \"local\", \"utc\" or an offset like \"+05:30\")")]
    InvalidTimezone(String),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// The log file could not be used
#[derive(Debug, Error)]
pub enum SinkError {
    /// Opening or creating the day's file failed
    #[error("log file {path} unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Appending to an already open file failed
    #[error("failed to write log file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SinkError {
    /// Path of the file the failure refers to
    pub fn path(&self) -> &PathBuf {
        match self {
            SinkError::Unavailable { path, .. } | SinkError::Write { path, .. } => path,
        }
    }
}

/// A retention sweep problem. Sweeps never fail; these are collected in the report.
#[derive(Debug, Error)]
pub enum SweepError {
    /// One entry could not be inspected or removed; the sweep moved on
    #[error("Error accessing file {name}: {source}. Skipping.")]
    Entry {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The directory itself could not be listed; the sweep stopped
    #[error("Error during log cleanup: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
