//! Hotloop Supervisor - build coordination and process supervision
//!
//! This crate is the core of hotloop. It takes change events from the
//! watcher and turns them into:
//! - Debounced builds, never more than one at a time
//! - A restart of the built binary after every successful build
//!
//! Everything stops when the shared lifecycle is cancelled, either by
//! Ctrl-C or by a fatal build failure.

mod builder;
mod coordinator;
mod dev_loop;
mod error;
mod launcher;
mod runner;

#[cfg(test)]
mod testing;

pub use builder::{Builder, CommandBuilder};
pub use coordinator::{BuildCoordinator, RestartSignal};
pub use dev_loop::DevLoop;
pub use error::{LoopError, RunError};
pub use launcher::{CommandLauncher, Launcher, Process, Stopping, SupervisedChild};
pub use runner::RunSupervisor;
