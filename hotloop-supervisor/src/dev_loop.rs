//! The edit → rebuild → restart loop.
//!
//! Wires the change source into the coordinator and the coordinator into
//! the supervisor, then waits for the shared lifecycle to fire.

use crate::builder::{Builder, CommandBuilder};
use crate::coordinator::BuildCoordinator;
use crate::error::LoopError;
use crate::launcher::{CommandLauncher, Launcher};
use crate::runner::RunSupervisor;
use hotloop_core::{Configuration, Exit, Lifecycle, Trigger};
use hotloop_watcher::{ChangeSource, WatchError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub struct DevLoop {
    config: Configuration,
    lifecycle: Lifecycle,
    builder: Arc<dyn Builder>,
    launcher: Arc<dyn Launcher>,
}

impl DevLoop {
    /// A loop that builds with the configured command and runs real processes.
    pub fn new(config: Configuration) -> Self {
        let builder = Arc::new(CommandBuilder::new(&config));
        Self {
            config,
            lifecycle: Lifecycle::new(),
            builder,
            launcher: Arc::new(CommandLauncher),
        }
    }

    pub fn with_builder(mut self, builder: Arc<dyn Builder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Handle for stopping the loop from outside.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    /// Runs until Ctrl-C or a fatal condition.
    pub async fn run(self) -> Result<Exit, LoopError> {
        let lifecycle = self.lifecycle;

        let stream = match ChangeSource::new(&self.config, lifecycle.clone()).spawn() {
            Ok(stream) => stream,
            // the change source already failed the lifecycle
            Err(WatchError::RootUnavailable { .. }) => return Ok(lifecycle.exit()),
            Err(e) => return Err(e.into()),
        };
        let (events, mut errors) = stream.split();

        let (restart_tx, restart_rx) = mpsc::channel(1);
        let coordinator = BuildCoordinator::new(
            self.config.build_delay(),
            self.builder,
            restart_tx,
            lifecycle.clone(),
        );
        let supervisor = RunSupervisor::new(
            self.config.full_build_path(),
            self.launcher,
            lifecycle.clone(),
        );

        let signals = tokio::spawn(listen_for_ctrl_c(lifecycle.clone()));
        let error_log = tokio::spawn(async move {
            while let Some(e) = errors.recv().await {
                warn!("{}", e);
            }
        });
        let pump = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.pump(events).await }
        });
        let supervise = tokio::spawn(supervisor.run(restart_rx));

        info!("Watching {} for changes", self.config.app_root.display());
        coordinator.notify(Trigger::Startup);

        let supervised = supervise.await;
        // whatever ended the supervisor, everything else stops with it
        lifecycle.shutdown();
        let pumped = pump.await;
        let _ = error_log.await;
        signals.abort();

        if let Err(source) = supervised {
            error!("Supervisor task failed: {}", source);
            return Err(LoopError::TaskPanicked {
                task: "supervisor",
                source,
            });
        }
        if let Err(source) = pumped {
            error!("Coordinator task failed: {}", source);
            return Err(LoopError::TaskPanicked {
                task: "coordinator",
                source,
            });
        }

        Ok(lifecycle.exit())
    }
}

async fn listen_for_ctrl_c(lifecycle: Lifecycle) {
    tokio::select! {
        _ = lifecycle.cancelled() => {}
        res = tokio::signal::ctrl_c() => match res {
            Ok(()) => lifecycle.shutdown(),
            Err(e) => warn!("Can't listen for Ctrl-C: {}", e),
        },
    }
}
