//! Directory scanning.
//!
//! Walks the watch root to find the directories to watch and the source
//! files inside them. Runs once at startup and again on every rescan tick.

use crate::error::WatchError;
use crate::filter::PathFilter;
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

/// Result of scanning the watch root.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Directories that get a (non-recursive) watch.
    pub directories: BTreeSet<PathBuf>,

    /// Source files found in those directories.
    pub files: BTreeSet<PathBuf>,

    /// Entries that couldn't be walked. Not fatal.
    pub errors: Vec<WatchError>,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

/// Scans the filter's root and returns what should be watched.
///
/// Fails only when the root itself can't be read; anything below it that
/// errors is collected in `ScanResult::errors`.
///
/// # Example
///
/// ```no_run
/// use hotloop_core::Configuration;
/// use hotloop_watcher::{scan_tree, PathFilter};
/// use std::path::Path;
///
/// let config = Configuration::for_project(Path::new("."));
/// let result = scan_tree(&PathFilter::new(&config), false).unwrap();
/// println!("watching {} files", result.files.len());
/// ```
pub fn scan_tree(filter: &PathFilter, respect_gitignore: bool) -> Result<ScanResult, WatchError> {
    let start = Instant::now();
    let root = filter.root().to_path_buf();

    let meta = std::fs::metadata(&root).map_err(|source| WatchError::RootUnavailable {
        path: root.clone(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(WatchError::RootUnavailable {
            path: root.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let mut result = ScanResult::default();

    let skip = filter.clone();
    let walker = WalkBuilder::new(&root)
        .hidden(false) // dot directories are handled by the filter
        .parents(respect_gitignore)
        .ignore(respect_gitignore)
        .git_ignore(respect_gitignore)
        .git_global(respect_gitignore)
        .git_exclude(respect_gitignore)
        .require_git(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().map_or(false, |t| t.is_dir());
            if is_dir && entry.depth() > 0 && skip.is_ignored_dir(entry.path()) {
                debug!("Skipping {}", entry.path().display());
                return false;
            }
            true
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                result.errors.push(WatchError::Scan(e));
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().map_or(false, |t| t.is_dir()) {
            result.directories.insert(path.to_path_buf());
        } else if filter.is_watched_file(path) {
            result.files.insert(path.to_path_buf());
        }
    }

    result.duration_ms = start.elapsed().as_millis() as u64;
    Ok(result)
}
