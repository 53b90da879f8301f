//! Error types for the supervisor.

use hotloop_watcher::WatchError;
use std::path::PathBuf;
use thiserror::Error;

/// Why a restart didn't leave a running process behind.
#[derive(Error, Debug)]
pub enum RunError {
    /// The freshly built binary couldn't be started.
    #[error("failed to start '{path}': {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run is shutting down; no new process is started.
    #[error("shutting down, not starting a new process")]
    Cancelled,
}

/// Failures of the dev loop as a whole.
#[derive(Error, Debug)]
pub enum LoopError {
    /// The change source couldn't be started.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// One of the loop's tasks panicked.
    #[error("{task} task panicked: {source}")]
    TaskPanicked {
        task: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}
