//! Hotloop Core - configuration, lifecycle and build data model
//!
//! This crate holds the types every other hotloop crate agrees on:
//! the resolved configuration, change events and build triggers,
//! build runs and failure classification, and the process-wide
//! cancellation signal.
//!
//! # Example
//!
//! ```no_run
//! use hotloop_core::{Configuration, FailureClassifier};
//! use std::path::Path;
//!
//! let config = Configuration::for_project(Path::new("/src/shop")).validate().unwrap();
//! let classifier = FailureClassifier::new(config.fatal_markers.clone());
//! println!("building into {}", config.full_build_path().display());
//! ```

pub mod build;
pub mod config;
pub mod error;
pub mod event;
pub mod lifecycle;

pub use build::{BuildFailure, BuildReport, BuildRun, FailureClassifier, FailureKind};
pub use config::{Configuration, CONFIG_FILE_NAME};
pub use error::{ConfigError, Fatal, Result};
pub use event::{ChangeEvent, ChangeKind, Trigger};
pub use lifecycle::{Exit, Lifecycle};
