//! Starting and stopping the supervised binary.

use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Starts the built binary.
pub trait Launcher: Send + Sync {
    /// Starts `binary` with no arguments.
    fn launch(&self, binary: &Path) -> io::Result<Box<dyn Process>>;
}

/// A running child the supervisor may stop.
pub trait Process: Send {
    fn id(&self) -> Option<u32>;

    /// Requests termination and gives up the handle.
    ///
    /// The returned [`Stopping`] resolves once the child has been killed
    /// and reaped.
    fn terminate(self: Box<Self>) -> Stopping;
}

/// A termination in flight.
#[derive(Debug, Default)]
pub struct Stopping(Option<JoinHandle<()>>);

impl Stopping {
    /// Nothing left to wait for.
    pub fn done() -> Self {
        Self(None)
    }

    /// Waits until the child is gone.
    pub async fn wait(self) {
        if let Some(reaper) = self.0 {
            if let Err(e) = reaper.await {
                warn!("Reaper task failed: {}", e);
            }
        }
    }
}

/// Launches real processes attached to this terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandLauncher;

impl Launcher for CommandLauncher {
    fn launch(&self, binary: &Path) -> io::Result<Box<dyn Process>> {
        let child = Command::new(binary)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id();
        let (stop_tx, stop_rx) = oneshot::channel();
        let reaper = tokio::spawn(reap(child, pid, stop_rx));

        Ok(Box::new(SupervisedChild {
            pid,
            stop: stop_tx,
            reaper,
        }))
    }
}

/// Handle to a child started by [`CommandLauncher`].
///
/// Dropping the handle stops the child too.
#[derive(Debug)]
pub struct SupervisedChild {
    pid: Option<u32>,
    stop: oneshot::Sender<()>,
    reaper: JoinHandle<()>,
}

impl Process for SupervisedChild {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn terminate(self: Box<Self>) -> Stopping {
        // Err means the child already exited and was reaped
        let _ = self.stop.send(());
        Stopping(Some(self.reaper))
    }
}

/// Owns the child until it exits, killing it when asked.
async fn reap(mut child: Child, pid: Option<u32>, stop: oneshot::Receiver<()>) {
    let pid = pid.map_or_else(|| "?".to_string(), |p| p.to_string());

    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => info!("Process exited (PID: {}) ({})", pid, status),
            Err(e) => warn!("Lost track of PID {}: {}", pid, e),
        },
        _ = stop => {
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill PID {}: {}", pid, e);
            }
            match child.wait().await {
                Ok(status) => info!("Stopped (PID: {}) ({})", pid, status),
                Err(e) => warn!("Lost track of PID {}: {}", pid, e),
            }
        }
    }
}
