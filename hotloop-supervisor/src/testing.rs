//! Fakes for the builder and launcher seams.

use crate::builder::Builder;
use crate::launcher::{Launcher, Process, Stopping};
use async_trait::async_trait;
use hotloop_core::{BuildFailure, BuildRun, Trigger};
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every build and answers from a queue of results.
pub(crate) struct ScriptedBuilder {
    duration: Duration,
    results: Mutex<VecDeque<Result<(), BuildFailure>>>,
    fallback: Mutex<Result<(), BuildFailure>>,
    triggers: Mutex<Vec<Trigger>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedBuilder {
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            duration,
            results: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(())),
            triggers: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub(crate) fn push_result(&self, result: Result<(), BuildFailure>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub(crate) fn fail_always(&self, failure: BuildFailure) {
        *self.fallback.lock().unwrap() = Err(failure);
    }

    pub(crate) fn triggers(&self) -> Vec<Trigger> {
        self.triggers.lock().unwrap().clone()
    }

    pub(crate) fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Builder for ScriptedBuilder {
    async fn build(&self, run: &BuildRun) -> Result<(), BuildFailure> {
        self.triggers.lock().unwrap().push(run.trigger.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.duration).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        let next = self.results.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }
}

/// Hands out fake processes with sequential PIDs and logs what happens to them.
#[derive(Default)]
pub(crate) struct RecordingLauncher {
    log: Arc<Mutex<Vec<String>>>,
    next_pid: AtomicU32,
    fail: AtomicBool,
}

impl RecordingLauncher {
    pub(crate) fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, _binary: &Path) -> io::Result<Box<dyn Process>> {
        if self.fail.swap(false, Ordering::SeqCst) {
            self.log.lock().unwrap().push("launch failed".into());
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such binary"));
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.lock().unwrap().push(format!("launch {}", pid));
        Ok(Box::new(FakeProcess {
            pid,
            log: Arc::clone(&self.log),
        }))
    }
}

struct FakeProcess {
    pid: u32,
    log: Arc<Mutex<Vec<String>>>,
}

impl Process for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn terminate(self: Box<Self>) -> Stopping {
        self.log.lock().unwrap().push(format!("terminate {}", self.pid));
        Stopping::done()
    }
}

/// Writes an executable that records its PID in `pid_file` and then sleeps.
#[cfg(unix)]
pub(crate) fn sleeper_script(dir: &Path, pid_file: &Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("sleeper");
    std::fs::write(
        &script,
        format!("#!/bin/sh\necho $$ > '{}'\nexec sleep 30\n", pid_file.display()),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

/// True while a process with this PID exists.
#[cfg(unix)]
pub(crate) fn pid_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
