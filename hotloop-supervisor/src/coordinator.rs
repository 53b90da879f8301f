//! Build coordination.
//!
//! Turns the noisy stream of change events into debounced, strictly
//! serialized builds:
//!
//! ```text
//! Idle --change--> Debouncing --delay--> Building --> Idle
//!                                            \-----> Fatal (lifecycle fails)
//! ```
//!
//! Events that arrive while debouncing replace the pending trigger.
//! Events that arrive while building don't get runs of their own: only
//! the latest one is remembered, and it opens a single follow-up window
//! once the build is done.

use crate::builder::Builder;
use hotloop_core::{BuildReport, BuildRun, ChangeEvent, Fatal, Lifecycle, Trigger};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// A new binary is ready to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartSignal;

#[derive(Debug)]
enum State {
    Idle,
    Debouncing { latest: Trigger },
    Building { missed: Option<Trigger> },
}

struct Inner {
    state: Mutex<State>,
    delay: Duration,
    builder: Arc<dyn Builder>,
    restarts: mpsc::Sender<RestartSignal>,
    lifecycle: Lifecycle,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the coordinator to `Idle` when a window is abandoned, either
/// by cancellation or by a panicking build.
struct WindowGuard {
    inner: Arc<Inner>,
    armed: bool,
}

impl WindowGuard {
    fn new(inner: Arc<Inner>) -> Self {
        Self { inner, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for WindowGuard {
    fn drop(&mut self) {
        if self.armed {
            *self.inner.state() = State::Idle;
        }
    }
}

/// Debounces change events and runs at most one build at a time.
#[derive(Clone)]
pub struct BuildCoordinator {
    inner: Arc<Inner>,
}

impl BuildCoordinator {
    pub fn new(
        delay: Duration,
        builder: Arc<dyn Builder>,
        restarts: mpsc::Sender<RestartSignal>,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Idle),
                delay,
                builder,
                restarts,
                lifecycle,
            }),
        }
    }

    /// Hands a trigger to the coordinator.
    ///
    /// Returns true when this trigger opened a new debounce window.
    pub fn notify(&self, trigger: impl Into<Trigger>) -> bool {
        let trigger = trigger.into();
        if self.inner.lifecycle.is_cancelled() {
            debug!("Shutting down, ignoring {}", trigger);
            return false;
        }

        let mut state = self.inner.state();
        if let State::Debouncing { latest } = &mut *state {
            debug!("Coalescing {}", trigger);
            *latest = trigger;
            return false;
        }
        if let State::Building { missed } = &mut *state {
            debug!("Build in progress, deferring {}", trigger);
            *missed = Some(trigger);
            return false;
        }

        *state = State::Debouncing { latest: trigger };
        drop(state);
        tokio::spawn(run_window(Arc::clone(&self.inner)));
        true
    }

    /// Feeds change events into `notify` until the stream ends or the
    /// lifecycle is cancelled.
    pub async fn pump(&self, mut events: mpsc::UnboundedReceiver<ChangeEvent>) {
        let lifecycle = self.inner.lifecycle.clone();
        loop {
            tokio::select! {
                biased;
                _ = lifecycle.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.notify(event);
                    }
                    None => break,
                },
            }
        }
        debug!("Coordinator stopped");
    }

    /// True when no window is armed or executing.
    pub fn is_idle(&self) -> bool {
        matches!(*self.inner.state(), State::Idle)
    }
}

async fn run_window(inner: Arc<Inner>) {
    let mut guard = WindowGuard::new(Arc::clone(&inner));
    let lifecycle = inner.lifecycle.clone();

    loop {
        tokio::select! {
            biased;
            _ = lifecycle.cancelled() => return,
            _ = tokio::time::sleep(inner.delay) => {}
        }

        let trigger = {
            let mut state = inner.state();
            match std::mem::replace(&mut *state, State::Building { missed: None }) {
                State::Debouncing { latest } => latest,
                other => {
                    *state = other;
                    return;
                }
            }
        };

        if lifecycle.is_cancelled() {
            return;
        }

        let run = BuildRun::start(trigger);
        info!("Rebuild on: {} at {}", run.trigger, run.started_at.format("%H:%M:%S"));

        let outcome = tokio::select! {
            biased;
            _ = lifecycle.cancelled() => return,
            outcome = inner.builder.build(&run) => outcome,
        };
        report(&inner, run.finish(outcome)).await;

        // decide under one lock, or a trigger landing in `missed` could be wiped
        let mut state = inner.state();
        let follow_up = match &mut *state {
            State::Building { missed } => missed.take(),
            _ => None,
        };
        match follow_up {
            Some(latest) if !lifecycle.is_cancelled() => {
                debug!("Changes arrived during the build, rebuilding for {}", latest);
                *state = State::Debouncing { latest };
            }
            _ => {
                *state = State::Idle;
                guard.disarm();
                return;
            }
        }
    }
}

async fn report(inner: &Inner, report: BuildReport) {
    match report.outcome {
        Ok(()) => {
            info!("Build completed in {:?}", report.duration);
            tokio::select! {
                biased;
                _ = inner.lifecycle.cancelled() => {}
                sent = inner.restarts.send(RestartSignal) => {
                    if sent.is_err() {
                        debug!("Supervisor gone, restart not delivered");
                    }
                }
            }
        }
        Err(failure) if failure.is_fatal() => {
            inner.lifecycle.fail(Fatal::NoBuildableSource {
                diagnostics: failure.diagnostics,
            });
        }
        Err(failure) => {
            error!("{} (after {:?})", failure, report.duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBuilder;
    use hotloop_core::{BuildFailure, ChangeKind, Exit, FailureKind};

    fn change(path: &str) -> ChangeEvent {
        ChangeEvent::new(path, ChangeKind::Write)
    }

    fn fatal(diagnostics: &str) -> BuildFailure {
        BuildFailure {
            kind: FailureKind::Fatal,
            diagnostics: diagnostics.into(),
        }
    }

    fn coordinator(
        delay_ms: u64,
        builder: Arc<ScriptedBuilder>,
    ) -> (BuildCoordinator, mpsc::Receiver<RestartSignal>, Lifecycle) {
        let (tx, rx) = mpsc::channel(1);
        let lifecycle = Lifecycle::new();
        let coordinator =
            BuildCoordinator::new(Duration::from_millis(delay_ms), builder, tx, lifecycle.clone());
        (coordinator, rx, lifecycle)
    }

    async fn wait_idle(coordinator: &BuildCoordinator) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !coordinator.is_idle() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("coordinator should return to idle");
    }

    #[tokio::test]
    async fn test_burst_coalesces_into_one_build_with_last_trigger() {
        let builder = Arc::new(ScriptedBuilder::new(Duration::ZERO));
        let (coordinator, mut restarts, _lifecycle) = coordinator(200, builder.clone());

        // editor save: write a temp file, rename it over, touch the result
        assert!(coordinator.notify(ChangeEvent::new("main.go", ChangeKind::Create)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!coordinator.notify(ChangeEvent::new("main.go", ChangeKind::Rename)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!coordinator.notify(change("main.go")));

        let signal = tokio::time::timeout(Duration::from_secs(5), restarts.recv())
            .await
            .unwrap();
        assert_eq!(signal, Some(RestartSignal));
        wait_idle(&coordinator).await;

        assert_eq!(builder.triggers(), vec![Trigger::Change(change("main.go"))]);
        assert!(restarts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_builds_never_overlap() {
        let builder = Arc::new(ScriptedBuilder::new(Duration::from_millis(60)));
        builder.fail_always(BuildFailure::transient("undefined: foo"));
        let (coordinator, _restarts, _lifecycle) = coordinator(10, builder.clone());

        let mut notifiers = Vec::new();
        for task in 0..8 {
            let coordinator = coordinator.clone();
            notifiers.push(tokio::spawn(async move {
                for i in 0..30 {
                    coordinator.notify(change(&format!("file_{}_{}.go", task, i)));
                    tokio::time::sleep(Duration::from_millis(7)).await;
                }
            }));
        }
        for notifier in notifiers {
            notifier.await.unwrap();
        }
        wait_idle(&coordinator).await;

        assert!(builder.triggers().len() >= 2);
        assert_eq!(builder.max_concurrent(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_returns_to_idle() {
        let builder = Arc::new(ScriptedBuilder::new(Duration::ZERO));
        builder.push_result(Err(BuildFailure::transient("./main.go:3:1: syntax error")));
        let (coordinator, mut restarts, lifecycle) = coordinator(10, builder.clone());

        coordinator.notify(change("main.go"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        wait_idle(&coordinator).await;

        assert!(restarts.try_recv().is_err());
        assert!(!lifecycle.is_cancelled());

        // the next change still builds, and this time it succeeds
        assert!(coordinator.notify(change("main.go")));
        let signal = tokio::time::timeout(Duration::from_secs(5), restarts.recv())
            .await
            .unwrap();
        assert_eq!(signal, Some(RestartSignal));
        assert_eq!(builder.triggers().len(), 2);
    }

    #[tokio::test]
    async fn test_fatal_failure_cancels_everything() {
        let builder = Arc::new(ScriptedBuilder::new(Duration::ZERO));
        builder.push_result(Err(fatal("no buildable Go source files in /src")));
        let (coordinator, mut restarts, lifecycle) = coordinator(10, builder.clone());

        coordinator.notify(Trigger::Startup);
        tokio::time::timeout(Duration::from_secs(5), lifecycle.cancelled())
            .await
            .unwrap();

        assert!(matches!(
            lifecycle.exit(),
            Exit::Fatal(Fatal::NoBuildableSource { .. })
        ));
        assert!(!coordinator.notify(change("main.go")));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(builder.triggers().len(), 1);
        assert!(restarts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_events_during_build_collapse_into_one_follow_up() {
        let builder = Arc::new(ScriptedBuilder::new(Duration::from_millis(200)));
        let (coordinator, mut restarts, _lifecycle) = coordinator(10, builder.clone());

        coordinator.notify(change("main.go"));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!coordinator.is_idle());
        assert!(!coordinator.notify(change("handlers.go")));
        assert!(!coordinator.notify(change("routes.go")));

        restarts.recv().await.unwrap();
        restarts.recv().await.unwrap();
        wait_idle(&coordinator).await;

        assert_eq!(
            builder.triggers(),
            vec![
                Trigger::Change(change("main.go")),
                Trigger::Change(change("routes.go"))
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_while_debouncing_skips_build() {
        let builder = Arc::new(ScriptedBuilder::new(Duration::ZERO));
        let (coordinator, _restarts, lifecycle) = coordinator(100, builder.clone());

        coordinator.notify(change("main.go"));
        lifecycle.shutdown();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(builder.triggers().is_empty());
        assert!(coordinator.is_idle());
    }

    #[tokio::test]
    async fn test_pump_forwards_events_until_cancelled() {
        let builder = Arc::new(ScriptedBuilder::new(Duration::ZERO));
        let (coordinator, mut restarts, lifecycle) = coordinator(10, builder.clone());
        let (tx, rx) = mpsc::unbounded_channel();

        let pump = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.pump(rx).await }
        });

        tx.send(change("main.go")).unwrap();
        restarts.recv().await.unwrap();

        lifecycle.shutdown();
        tokio::time::timeout(Duration::from_secs(5), pump)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(builder.triggers().len(), 1);
    }

    #[tokio::test]
    async fn test_change_right_after_a_build_is_never_lost() {
        let builder = Arc::new(ScriptedBuilder::new(Duration::ZERO));
        let (coordinator, mut restarts, _lifecycle) = coordinator(1, builder.clone());

        for i in 0..50 {
            coordinator.notify(change(&format!("file_{}.go", i)));
            let signal = tokio::time::timeout(Duration::from_secs(5), restarts.recv())
                .await
                .expect("every change should end in a build");
            assert_eq!(signal, Some(RestartSignal));
        }
        wait_idle(&coordinator).await;

        assert_eq!(builder.triggers().len(), 50);
    }
}
