//! Build attempts and how their failures are classified.

use crate::event::Trigger;
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

/// One build attempt, created when a debounce window closes.
#[derive(Debug, Clone)]
pub struct BuildRun {
    /// The last event of the burst that opened the window.
    pub trigger: Trigger,

    /// Wall-clock start, for logs.
    pub started_at: DateTime<Local>,

    started: Instant,
}

impl BuildRun {
    pub fn start(trigger: Trigger) -> Self {
        Self {
            trigger,
            started_at: Local::now(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Closes the run with its outcome.
    pub fn finish(self, outcome: Result<(), BuildFailure>) -> BuildReport {
        BuildReport {
            duration: self.elapsed(),
            run: self,
            outcome,
        }
    }
}

/// What a finished BuildRun produced.
#[derive(Debug)]
pub struct BuildReport {
    pub run: BuildRun,
    pub duration: Duration,
    pub outcome: Result<(), BuildFailure>,
}

impl BuildReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Whether a failure should stop the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Nothing to compile for the target. Retrying won't help.
    Fatal,
    /// A compile error or similar; the next change gets another try.
    Transient,
}

/// A failed build with the diagnostics the tool printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub kind: FailureKind,
    pub diagnostics: String,
}

impl BuildFailure {
    pub fn transient(diagnostics: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == FailureKind::Fatal
    }
}

impl std::fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            FailureKind::Fatal => "fatal",
            FailureKind::Transient => "failed",
        };
        write!(f, "build {}: {}", kind, self.diagnostics.trim_end())
    }
}

impl std::error::Error for BuildFailure {}

/// Sorts build diagnostics into fatal and transient failures.
///
/// Each diagnostic line is checked against the configured markers. A
/// marker must appear whole within a single line.
#[derive(Debug, Clone, Default)]
pub struct FailureClassifier {
    fatal_markers: Vec<String>,
}

impl FailureClassifier {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fatal_markers: markers
                .into_iter()
                .map(Into::into)
                .filter(|m: &String| !m.trim().is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, diagnostics: &str) -> FailureKind {
        let fatal = diagnostics.lines().any(|line| {
            self.fatal_markers
                .iter()
                .any(|marker| line.contains(marker.as_str()))
        });

        if fatal {
            FailureKind::Fatal
        } else {
            FailureKind::Transient
        }
    }

    /// Builds a failure with its kind already decided.
    pub fn failure(&self, diagnostics: impl Into<String>) -> BuildFailure {
        let diagnostics = diagnostics.into();
        BuildFailure {
            kind: self.classify(&diagnostics),
            diagnostics,
        }
    }
}
