//! Error types shared across hotloop.
//!
//! We keep errors simple and actionable. Each variant tells you
//! exactly what went wrong and (usually) how to fix it.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience type for functions that can fail while resolving configuration.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Things that can go wrong when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Couldn't read the config file from disk.
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but isn't valid JSON for a configuration record.
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The values parsed fine but can't be used to run a build.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Creates an IO error with the path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Conditions that bring the whole supervisor down.
///
/// Anything else is logged and absorbed by the component that hit it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fatal {
    /// The build tool found nothing to compile for the configured target.
    #[error("no buildable source for the build target:\n{diagnostics}")]
    NoBuildableSource { diagnostics: String },

    /// The watched root went away or can't be read anymore.
    #[error("watch root '{path}' is unavailable: {reason}")]
    RootUnavailable { path: PathBuf, reason: String },
}
