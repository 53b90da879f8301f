//! Startup configuration.
//!
//! Resolved once (defaults, then an optional `.hotloop.json`, then CLI
//! flags) and never mutated afterwards.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the config file picked up from the working directory.
pub const CONFIG_FILE_NAME: &str = ".hotloop.json";

/// Everything the watcher, coordinator and supervisor need to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    /// Directory to watch.
    pub app_root: PathBuf,

    /// Folder names that are never descended into.
    pub ignored_folders: Vec<String>,

    /// File extensions (with leading dot) that count as source.
    pub included_extensions: Vec<String>,

    /// File name suffixes that are never watched, even with a matching extension.
    pub skipped_suffixes: Vec<String>,

    /// Entry point handed to the build tool.
    pub build_target_path: String,

    /// Directory the binary is written to.
    pub build_path: PathBuf,

    /// File name of the built binary.
    pub binary_name: String,

    /// Debounce window, in milliseconds.
    pub build_delay_ms: u64,

    /// How often the tree is rescanned for new files, in milliseconds.
    pub rescan_interval_ms: u64,

    /// Build tool program plus any leading arguments.
    pub build_command: Vec<String>,

    /// Diagnostic fragments that mark a build failure as fatal.
    pub fatal_markers: Vec<String>,

    /// Whether `.gitignore` files prune the scan.
    pub respect_gitignore: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            app_root: PathBuf::from("."),
            ignored_folders: vec!["vendor".to_string()],
            included_extensions: vec![".go".to_string()],
            skipped_suffixes: vec!["_test.go".to_string()],
            build_target_path: ".".to_string(),
            build_path: PathBuf::from("tmp"),
            binary_name: String::new(),
            build_delay_ms: 200,
            rescan_interval_ms: 1000,
            build_command: vec!["go".to_string()],
            fatal_markers: vec![
                "no buildable Go source files".to_string(),
                "no Go files in".to_string(),
            ],
            respect_gitignore: false,
        }
    }
}

impl Configuration {
    /// Defaults for a project living in `working_dir`.
    ///
    /// The binary is named after the directory, like `go build` does.
    pub fn for_project(working_dir: &Path) -> Self {
        let binary_name = working_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("app")
            .to_string();

        Self {
            binary_name,
            ..Self::default()
        }
    }

    /// Reads a configuration from a JSON file.
    ///
    /// Fields missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks the record is usable and normalizes extensions.
    pub fn validate(mut self) -> Result<Self> {
        if self.binary_name.trim().is_empty() {
            return Err(ConfigError::Invalid("binary_name must not be empty".into()));
        }
        if self.build_command.first().map_or(true, |p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "build_command must name a program".into(),
            ));
        }
        if self.rescan_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "rescan_interval_ms must be greater than zero".into(),
            ));
        }

        self.included_extensions = self
            .included_extensions
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(|e| {
                if e.starts_with('.') {
                    e.to_string()
                } else {
                    format!(".{}", e)
                }
            })
            .collect();

        Ok(self)
    }

    pub fn build_delay(&self) -> Duration {
        Duration::from_millis(self.build_delay_ms)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_millis(self.rescan_interval_ms)
    }

    /// Where the built binary lands, with the host's executable suffix policy applied.
    pub fn full_build_path(&self) -> PathBuf {
        with_exe_suffix(
            self.build_path.join(&self.binary_name),
            std::env::consts::OS,
        )
    }

    /// Arguments passed after `build_command`: `build -v -o <out> <target>`.
    pub fn build_args(&self) -> Vec<OsString> {
        vec![
            "build".into(),
            "-v".into(),
            "-o".into(),
            self.full_build_path().into_os_string(),
            self.build_target_path.clone().into(),
        ]
    }
}

/// Appends `.exe` on Windows unless the path already carries it.
pub fn with_exe_suffix(path: PathBuf, target_os: &str) -> PathBuf {
    if target_os != "windows" {
        return path;
    }

    let already = path
        .to_str()
        .map(|s| s.to_ascii_lowercase().ends_with(".exe"))
        .unwrap_or(false);
    if already {
        return path;
    }

    let mut raw = path.into_os_string();
    raw.push(".exe");
    PathBuf::from(raw)
}
