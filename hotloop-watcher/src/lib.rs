//! Hotloop Watcher - the change source
//!
//! This crate handles the file system side of things:
//! - Scanning the project tree for source directories and files
//! - Watching those directories for changes
//! - Rescanning on a fixed interval to pick up new files
//!
//! It stops on its own once the shared lifecycle is cancelled.

mod error;
mod filter;
mod scanner;
mod watcher;

pub use error::WatchError;
pub use filter::PathFilter;
pub use scanner::{scan_tree, ScanResult};
pub use watcher::{ChangeSource, ChangeStream};
