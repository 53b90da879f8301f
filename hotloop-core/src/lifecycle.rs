//! Process-wide cancellation.
//!
//! One `Lifecycle` is created at startup and cloned into every task. It
//! fires once, either cleanly (Ctrl-C) or because of a fatal condition,
//! and never un-fires.

use crate::error::Fatal;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{error, info};

/// Shared cancellation signal plus the reason it fired, if fatal.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    token: CancellationToken,
    fatal: Arc<OnceLock<Fatal>>,
}

/// How the run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    Clean,
    Fatal(Fatal),
}

impl Exit {
    /// Process exit status for this outcome.
    pub fn code(&self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::Fatal(_) => 1,
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation fires. Use at every suspension point.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Stops the run without marking it as failed.
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("Shutting down");
        }
        self.token.cancel();
    }

    /// Stops the run because of `reason`. Only the first reason is kept.
    pub fn fail(&self, reason: Fatal) {
        if self.fatal.set(reason.clone()).is_ok() {
            error!("{}", reason);
        }
        self.token.cancel();
    }

    pub fn exit(&self) -> Exit {
        match self.fatal.get() {
            Some(reason) => Exit::Fatal(reason.clone()),
            None => Exit::Clean,
        }
    }
}
