//! Change notifications and build triggers.
//!
//! A ChangeEvent is what the watcher hands to the coordinator. It lives
//! just long enough to open (or join) a debounce window.

use std::path::{Path, PathBuf};

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Write,
    Remove,
    Rename,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Write => "write",
            Self::Remove => "remove",
            Self::Rename => "rename",
        };
        write!(f, "{}", s)
    }
}

/// A relevant file changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.kind)
    }
}

/// Why a build window was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The synthetic build fired once when the loop starts.
    Startup,
    /// A file change from the watcher.
    Change(ChangeEvent),
}

impl From<ChangeEvent> for Trigger {
    fn from(event: ChangeEvent) -> Self {
        Self::Change(event)
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Startup => write!(f, ":start:"),
            Self::Change(event) => write!(f, "{}", event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_display() {
        let event = ChangeEvent::new("main.go", ChangeKind::Write);
        assert_eq!(Trigger::Startup.to_string(), ":start:");
        assert_eq!(Trigger::from(event).to_string(), "main.go (write)");
    }
}
