//! Run supervision.
//!
//! The RunSupervisor owns the one "current" child. On every restart it
//! stops the old child (if any) before starting the new one, so two
//! generations never run side by side.

use crate::coordinator::RestartSignal;
use crate::error::RunError;
use crate::launcher::{Launcher, Process, Stopping};
use hotloop_core::Lifecycle;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

pub struct RunSupervisor {
    binary: PathBuf,
    launcher: Arc<dyn Launcher>,
    current: Option<Box<dyn Process>>,
    lifecycle: Lifecycle,
}

impl RunSupervisor {
    pub fn new(binary: PathBuf, launcher: Arc<dyn Launcher>, lifecycle: Lifecycle) -> Self {
        Self {
            binary,
            launcher,
            current: None,
            lifecycle,
        }
    }

    /// PID of the current child, if one is running.
    pub fn current_pid(&self) -> Option<u32> {
        self.current.as_ref().and_then(|p| p.id())
    }

    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    /// Replaces the current child with a fresh one.
    ///
    /// On a failed start the supervisor is left with no current child.
    pub fn restart(&mut self) -> Result<(), RunError> {
        self.stop_current();

        if self.lifecycle.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        let process = self
            .launcher
            .launch(&self.binary)
            .map_err(|source| RunError::Launch {
                path: self.binary.clone(),
                source,
            })?;

        info!(
            "Started {} (PID: {})",
            self.binary.display(),
            process.id().map_or_else(|| "?".to_string(), |p| p.to_string())
        );
        self.current = Some(process);
        Ok(())
    }

    /// Asks the current child to stop and forgets it.
    ///
    /// Await the returned [`Stopping`] to know the child is gone.
    pub fn stop_current(&mut self) -> Stopping {
        match self.current.take() {
            Some(process) => {
                info!(
                    "Stopping: PID {}",
                    process.id().map_or_else(|| "?".to_string(), |p| p.to_string())
                );
                process.terminate()
            }
            None => Stopping::done(),
        }
    }

    /// Restarts once per signal until the lifecycle is cancelled, then
    /// stops whatever is still running.
    pub async fn run(mut self, mut restarts: mpsc::Receiver<RestartSignal>) {
        let lifecycle = self.lifecycle.clone();
        loop {
            tokio::select! {
                biased;
                _ = lifecycle.cancelled() => break,
                signal = restarts.recv() => match signal {
                    Some(RestartSignal) => match self.restart() {
                        Ok(()) => {}
                        Err(RunError::Cancelled) => debug!("Restart skipped, shutting down"),
                        Err(e) => error!("{}", e),
                    },
                    None => break,
                },
            }
        }

        // the child must be reaped before the loop reports it is done
        self.stop_current().wait().await;
        debug!("Supervisor stopped");
    }
}
