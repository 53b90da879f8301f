//! Which directories get scanned and which files count as source.

use hotloop_core::Configuration;
use std::path::{Component, Path, PathBuf};

/// Ignore/include rules derived from the configuration.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    ignored_folders: Vec<String>,
    included_extensions: Vec<String>,
    skipped_suffixes: Vec<String>,
}

impl PathFilter {
    pub fn new(config: &Configuration) -> Self {
        let trimmed = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };

        Self {
            root: config.app_root.clone(),
            ignored_folders: trimmed(&config.ignored_folders),
            included_extensions: trimmed(&config.included_extensions),
            skipped_suffixes: trimmed(&config.skipped_suffixes),
        }
    }

    /// Same rules, anchored at a different root.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True when the directory (and everything below it) is skipped.
    ///
    /// Underscore and dot directories are private by convention; the root
    /// itself is never skipped even when it is `.`.
    pub fn is_ignored_dir(&self, dir: &Path) -> bool {
        let relative = match dir.strip_prefix(&self.root) {
            Ok(rel) => rel,
            Err(_) => dir,
        };

        relative.components().any(|component| match component {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                name.starts_with('_')
                    || name.starts_with('.')
                    || self.ignored_folders.iter().any(|f| *f == name)
            }
            _ => false,
        })
    }

    /// True when changes to this file should trigger a build.
    pub fn is_watched_file(&self, path: &Path) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        if self.skipped_suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            return false;
        }

        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext,
            None => return false,
        };
        if !self
            .included_extensions
            .iter()
            .any(|e| e.strip_prefix('.').unwrap_or(e) == ext)
        {
            return false;
        }

        match path.parent() {
            Some(parent) => !self.is_ignored_dir(parent),
            None => true,
        }
    }
}
