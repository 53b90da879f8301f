//! Errors raised while scanning or watching the tree.

use std::path::PathBuf;
use thiserror::Error;

/// Things that can go wrong in the change source.
///
/// Only `RootUnavailable` stops the supervisor; the rest are reported on
/// the error stream and the watcher keeps going.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The root directory is missing or unreadable.
    #[error("watch root '{path}' is unavailable: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single entry couldn't be walked.
    #[error("failed to scan: {0}")]
    Scan(#[from] ignore::Error),

    /// The OS notification backend reported a problem.
    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),
}
