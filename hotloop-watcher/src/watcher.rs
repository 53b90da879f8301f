//! File watcher for real-time updates.
//!
//! Uses the notify crate for change notifications on every scanned
//! directory, plus a fixed-interval rescan that picks up new directories
//! and files the OS backend never told us about.

use crate::error::WatchError;
use crate::filter::PathFilter;
use crate::scanner::{scan_tree, ScanResult};
use hotloop_core::{ChangeEvent, ChangeKind, Configuration, Fatal, Lifecycle};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// The two lazy sequences the change source produces.
///
/// Both end once the lifecycle is cancelled.
pub struct ChangeStream {
    pub events: UnboundedReceiver<ChangeEvent>,
    pub errors: UnboundedReceiver<WatchError>,
}

impl ChangeStream {
    /// Waits for the next relevant change.
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Waits for the next non-fatal scan or watch error.
    pub async fn next_error(&mut self) -> Option<WatchError> {
        self.errors.recv().await
    }

    pub fn split(self) -> (UnboundedReceiver<ChangeEvent>, UnboundedReceiver<WatchError>) {
        (self.events, self.errors)
    }
}

/// Watches the configured root for source changes.
pub struct ChangeSource {
    filter: PathFilter,
    respect_gitignore: bool,
    rescan_interval: Duration,
    lifecycle: Lifecycle,
}

impl ChangeSource {
    pub fn new(config: &Configuration, lifecycle: Lifecycle) -> Self {
        // notify reports absolute paths, so the filter has to agree on the root
        let root = std::fs::canonicalize(&config.app_root)
            .unwrap_or_else(|_| config.app_root.clone());

        Self {
            filter: PathFilter::new(config).with_root(root),
            respect_gitignore: config.respect_gitignore,
            rescan_interval: config.rescan_interval(),
            lifecycle,
        }
    }

    /// Scans the tree, installs the watches and starts the watch task.
    ///
    /// An unreadable root fails the lifecycle as well as returning the error.
    pub fn spawn(self) -> Result<ChangeStream, WatchError> {
        let (raw_tx, raw_rx) = unbounded_channel();
        let (events_tx, events_rx) = unbounded_channel();
        let (errors_tx, errors_rx) = unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            // Receiver gone means the task stopped; nothing left to tell.
            let _ = raw_tx.send(res);
        })?;

        let scan = match scan_tree(&self.filter, self.respect_gitignore) {
            Ok(scan) => scan,
            Err(e) => {
                self.fail_root(&e);
                return Err(e);
            }
        };

        let mut watched = WatchSet::default();
        let delta = watched.reconcile(&scan);
        let failed = watch_dirs(&mut watcher, self.filter.root(), &delta.added_dirs, &mut watched)?;
        for e in scan.errors.into_iter().chain(failed) {
            warn!("{}", e);
        }
        info!(
            "Watching {} files in {} ({}ms)",
            watched.files.len(),
            self.filter.root().display(),
            scan.duration_ms
        );

        let task = WatchTask {
            source: self,
            watcher,
            watched,
            raw: raw_rx,
            events: events_tx,
            errors: errors_tx,
        };
        tokio::spawn(task.run());

        Ok(ChangeStream {
            events: events_rx,
            errors: errors_rx,
        })
    }

    fn fail_root(&self, err: &WatchError) {
        if let WatchError::RootUnavailable { path, source } = err {
            self.lifecycle.fail(Fatal::RootUnavailable {
                path: path.clone(),
                reason: source.to_string(),
            });
        }
    }
}

/// Directories under watch and source files known to exist.
#[derive(Debug, Default)]
struct WatchSet {
    directories: BTreeSet<PathBuf>,
    files: BTreeSet<PathBuf>,
}

/// What changed between the watch set and a fresh scan.
#[derive(Debug, Default, PartialEq, Eq)]
struct Delta {
    added_dirs: Vec<PathBuf>,
    removed_dirs: Vec<PathBuf>,
    created_files: Vec<PathBuf>,
    removed_files: Vec<PathBuf>,
}

impl Delta {
    fn files_changed(&self) -> bool {
        !self.created_files.is_empty() || !self.removed_files.is_empty()
    }
}

impl WatchSet {
    /// Replaces the set with `scan` and reports the difference.
    fn reconcile(&mut self, scan: &ScanResult) -> Delta {
        let delta = Delta {
            added_dirs: scan.directories.difference(&self.directories).cloned().collect(),
            removed_dirs: self.directories.difference(&scan.directories).cloned().collect(),
            created_files: scan.files.difference(&self.files).cloned().collect(),
            removed_files: self.files.difference(&scan.files).cloned().collect(),
        };

        self.directories = scan.directories.clone();
        self.files = scan.files.clone();
        delta
    }

    /// Keeps the known-file set in step with a notification.
    fn observe(&mut self, path: &Path, kind: ChangeKind) {
        match kind {
            ChangeKind::Remove => {
                self.files.remove(path);
            }
            ChangeKind::Create | ChangeKind::Write | ChangeKind::Rename => {
                if path.exists() {
                    self.files.insert(path.to_path_buf());
                } else {
                    self.files.remove(path);
                }
            }
        }
    }
}

/// Adds a non-recursive watch for each of `dirs`.
///
/// Failing to watch the root is an error. Any other failure is collected,
/// and the directory leaves the watch set so the next rescan retries it.
fn watch_dirs<W: Watcher>(
    watcher: &mut W,
    root: &Path,
    dirs: &[PathBuf],
    watched: &mut WatchSet,
) -> Result<Vec<WatchError>, WatchError> {
    let mut failed = Vec::new();
    for dir in dirs {
        if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
            if dir == root {
                return Err(e.into());
            }
            watched.directories.remove(dir);
            failed.push(WatchError::Notify(e));
        }
    }
    Ok(failed)
}

/// Maps a notify event kind onto ours. Metadata-only changes are dropped.
fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Create),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
        EventKind::Modify(_) => Some(ChangeKind::Write),
        EventKind::Remove(_) => Some(ChangeKind::Remove),
        _ => None,
    }
}

struct WatchTask {
    source: ChangeSource,
    watcher: RecommendedWatcher,
    watched: WatchSet,
    raw: UnboundedReceiver<Result<Event, notify::Error>>,
    events: UnboundedSender<ChangeEvent>,
    errors: UnboundedSender<WatchError>,
}

impl WatchTask {
    async fn run(mut self) {
        let lifecycle = self.source.lifecycle.clone();
        let mut ticker = tokio::time::interval(self.source.rescan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately and the initial scan already ran
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = lifecycle.cancelled() => break,
                Some(res) = self.raw.recv() => match res {
                    Ok(event) => self.handle(event),
                    Err(e) => self.report(WatchError::Notify(e)),
                },
                _ = ticker.tick() => {
                    if !self.rescan().await {
                        break;
                    }
                }
            }
        }

        debug!("Change source stopped");
    }

    fn handle(&mut self, event: Event) {
        let Some(kind) = change_kind(&event.kind) else {
            return;
        };

        for path in event.paths {
            if !self.source.filter.is_watched_file(&path) {
                continue;
            }
            debug!("File {}: {}", kind, path.display());
            self.watched.observe(&path, kind);
            self.emit(ChangeEvent::new(path, kind));
        }
    }

    /// Returns false when the root is gone and the task should stop.
    async fn rescan(&mut self) -> bool {
        let filter = self.source.filter.clone();
        let respect_gitignore = self.source.respect_gitignore;
        let scan = tokio::task::spawn_blocking(move || scan_tree(&filter, respect_gitignore)).await;

        let scan = match scan {
            Ok(Ok(scan)) => scan,
            Ok(Err(e @ WatchError::RootUnavailable { .. })) => {
                self.source.fail_root(&e);
                return false;
            }
            Ok(Err(e)) => {
                self.report(e);
                return true;
            }
            Err(e) => {
                error!("Rescan task failed: {}", e);
                return true;
            }
        };

        let delta = self.watched.reconcile(&scan);
        for e in scan.errors {
            self.report(e);
        }

        for dir in &delta.added_dirs {
            debug!("Watching new directory {}", dir.display());
        }
        let root = self.source.filter.root().to_path_buf();
        match watch_dirs(&mut self.watcher, &root, &delta.added_dirs, &mut self.watched) {
            Ok(failed) => failed.into_iter().for_each(|e| self.report(e)),
            Err(e) => self.report(e),
        }
        for dir in &delta.removed_dirs {
            // the backend usually drops the watch itself once the directory is gone
            if let Err(e) = self.watcher.unwatch(dir) {
                debug!("Unwatch {}: {}", dir.display(), e);
            }
        }

        for path in &delta.created_files {
            self.emit(ChangeEvent::new(path.clone(), ChangeKind::Create));
        }
        for path in &delta.removed_files {
            self.emit(ChangeEvent::new(path.clone(), ChangeKind::Remove));
        }

        if delta.files_changed() {
            info!("Watching {} files", self.watched.files.len());
        }
        true
    }

    fn emit(&self, event: ChangeEvent) {
        if self.events.send(event).is_err() {
            debug!("Change stream closed, dropping event");
        }
    }

    fn report(&self, err: WatchError) {
        if let Err(unsent) = self.errors.send(err) {
            warn!("{}", unsent.0);
        }
    }
}
