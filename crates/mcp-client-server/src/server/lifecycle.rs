//! Graceful shutdown.
//!
//! Subsystems register named cleanup operations with a
//! [`ShutdownCoordinator`] at startup. When a termination signal arrives,
//! every operation runs concurrently and the whole set races a single
//! deadline. Individual failures are logged and do not stop the others; a
//! missed deadline ends the process.

use core::{future::Future, pin::Pin, time::Duration};
use futures::FutureExt;
use std::{collections::BTreeSet, panic::AssertUnwindSafe};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Wake reason reported when the listener exits without a signal.
pub const LISTENER_STOPPED: &str = "listener stopped";

type OperationFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type Operation = Box<dyn FnOnce() -> OperationFuture + Send>;

pub struct ShutdownCoordinator {
    timeout: Duration,
    operations: Vec<(String, Operation)>,
}

/// Per-operation result of a shutdown that finished within its deadline.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every operation finished, successfully or not.
    Completed(ShutdownReport),
    /// The deadline elapsed first. `pending` lists the unfinished operations.
    TimedOut { pending: Vec<String> },
}

impl ShutdownCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            operations: Vec::new(),
        }
    }

    /// Adds a named operation. Operations run in no particular order.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, operation: F) -> &mut Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.operations.push((
            name.into(),
            Box::new(move || Box::pin(operation()) as OperationFuture),
        ));
        self
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Spawns every operation and waits for all of them, bounded by the
    /// coordinator's timeout. Each completion or failure is logged once.
    /// Operations still running at the deadline are aborted.
    pub async fn run(self) -> ShutdownOutcome {
        let mut tasks = JoinSet::new();
        let mut pending = BTreeSet::new();

        for (name, operation) in self.operations {
            pending.insert(name.clone());
            tasks.spawn(async move {
                let result = AssertUnwindSafe(operation())
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("operation panicked")));
                (name, result)
            });
        }

        let mut report = ShutdownReport::default();
        let join_all = async {
            while let Some(joined) = tasks.join_next().await {
                let Ok((name, result)) = joined else {
                    continue;
                };
                pending.remove(&name);

                match result {
                    Ok(()) => {
                        tracing::info!(operation = %name, "shutdown operation completed");
                        report.completed.push(name);
                    }
                    Err(e) => {
                        tracing::error!(operation = %name, error = %e, "shutdown operation failed");
                        report.failed.push(name);
                    }
                }
            }
        };

        match tokio::time::timeout(self.timeout, join_all).await {
            Ok(()) => ShutdownOutcome::Completed(report),
            Err(_) => {
                tasks.abort_all();
                ShutdownOutcome::TimedOut {
                    pending: pending.into_iter().collect(),
                }
            }
        }
    }
}

/// Resolves on SIGINT, SIGTERM, SIGHUP, or when `trigger` is cancelled (the
/// listener exited on its own). Returns what woke it.
pub async fn wait_for_signal(trigger: &CancellationToken) -> anyhow::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        let mut hangup = signal(SignalKind::hangup())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT").map_err(Into::into),
            _ = terminate.recv() => Ok("SIGTERM"),
            _ = hangup.recv() => Ok("SIGHUP"),
            () = trigger.cancelled() => Ok(LISTENER_STOPPED),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| "Ctrl+C").map_err(Into::into),
            () = trigger.cancelled() => Ok(LISTENER_STOPPED),
        }
    }
}

/// Waits for a termination signal, then drives `coordinator` to completion.
///
/// If the deadline elapses first the process exits with status 1 without
/// waiting for the remaining operations.
///
/// # Errors
///
/// When `trigger` woke the waiter, the cleanup still runs and an error is
/// returned afterwards: a listener that dies on its own is fatal.
pub async fn graceful_shutdown(
    coordinator: ShutdownCoordinator,
    trigger: CancellationToken,
) -> anyhow::Result<()> {
    let reason = wait_for_signal(&trigger).await?;
    tracing::info!(
        reason,
        operations = coordinator.len(),
        "Shutdown signal received, terminating gracefully..."
    );

    match coordinator.run().await {
        ShutdownOutcome::Completed(report) => {
            tracing::info!(
                completed = report.completed.len(),
                failed = report.failed.len(),
                "Shutdown complete"
            );
            if reason == LISTENER_STOPPED {
                anyhow::bail!("gRPC listener stopped unexpectedly");
            }
            Ok(())
        }
        ShutdownOutcome::TimedOut { pending } => {
            tracing::error!(?pending, "Shutdown timed out, forcing exit");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::telemetry::capture::capture;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use tokio::time::{Instant, sleep};

    const DEADLINE: Duration = Duration::from_secs(3);

    async fn flush_failed() -> anyhow::Result<()> {
        anyhow::bail!("flush failed")
    }

    async fn explode() -> anyhow::Result<()> {
        panic!("boom")
    }

    #[tokio::test(start_paused = true)]
    async fn quick_operations_finish_before_the_deadline() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut coordinator = ShutdownCoordinator::new(DEADLINE);

        for name in ["chat-service", "grpc-server", "telemetry"] {
            let runs = Arc::clone(&runs);
            coordinator.register(name, move || async move {
                sleep(Duration::from_millis(50)).await;
                runs.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            });
        }

        let start = Instant::now();
        let outcome = coordinator.run().await;

        assert!(start.elapsed() < DEADLINE);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        match outcome {
            ShutdownOutcome::Completed(mut report) => {
                report.completed.sort();
                assert_eq!(
                    report.completed,
                    vec!["chat-service", "grpc-server", "telemetry"]
                );
                assert!(report.failed.is_empty());
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn operations_run_concurrently() {
        let mut coordinator = ShutdownCoordinator::new(DEADLINE);
        for name in ["a", "b", "c", "d"] {
            coordinator.register(name, || async {
                sleep(Duration::from_secs(2)).await;
                anyhow::Ok(())
            });
        }

        let start = Instant::now();
        let outcome = coordinator.run().await;

        assert!(matches!(outcome, ShutdownOutcome::Completed(_)));
        assert!(start.elapsed() < DEADLINE);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_operation_hits_the_deadline() {
        let mut coordinator = ShutdownCoordinator::new(DEADLINE);
        coordinator
            .register("quick", || async { anyhow::Ok(()) })
            .register("stuck", || std::future::pending::<anyhow::Result<()>>());
        for i in 0..8 {
            coordinator.register(format!("extra-{i}"), || async { anyhow::Ok(()) });
        }

        let start = Instant::now();
        let outcome = coordinator.run().await;
        let elapsed = start.elapsed();

        assert!(elapsed >= DEADLINE);
        assert!(elapsed < DEADLINE + Duration::from_millis(100));
        assert_eq!(
            outcome,
            ShutdownOutcome::TimedOut {
                pending: vec!["stuck".to_string()]
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_reported_without_blocking_others() {
        let mut coordinator = ShutdownCoordinator::new(DEADLINE);
        coordinator
            .register("ok", || async { anyhow::Ok(()) })
            .register("broken", flush_failed)
            .register("panics", explode);

        match coordinator.run().await {
            ShutdownOutcome::Completed(mut report) => {
                report.failed.sort();
                assert_eq!(report.completed, vec!["ok"]);
                assert_eq!(report.failed, vec!["broken", "panics"]);
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_coordinator_completes_immediately() {
        let coordinator = ShutdownCoordinator::new(DEADLINE);
        assert_eq!(coordinator.len(), 0);
        assert_eq!(
            coordinator.run().await,
            ShutdownOutcome::Completed(ShutdownReport::default())
        );
    }

    #[tokio::test]
    async fn cancelled_trigger_wakes_the_waiter() {
        let trigger = CancellationToken::new();
        trigger.cancel();
        assert_eq!(wait_for_signal(&trigger).await.unwrap(), LISTENER_STOPPED);
    }

    #[tokio::test]
    async fn listener_failure_runs_cleanup_then_fails() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut coordinator = ShutdownCoordinator::new(DEADLINE);
        for name in ["chat-service", "telemetry"] {
            let runs = Arc::clone(&runs);
            coordinator.register(name, move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            });
        }

        let trigger = CancellationToken::new();
        trigger.cancel();

        let err = graceful_shutdown(coordinator, trigger).await.unwrap_err();
        assert!(err.to_string().contains("listener stopped unexpectedly"));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn each_operation_is_logged_once() {
        let (captured, _guard) = capture();
        let mut coordinator = ShutdownCoordinator::new(DEADLINE);
        coordinator
            .register("ok", || async { anyhow::Ok(()) })
            .register("broken", flush_failed)
            .register("panics", explode);

        coordinator.run().await;

        let records = captured.with_field("operation");
        assert_eq!(records.len(), 3);
        for name in ["ok", "broken", "panics"] {
            let matching: Vec<_> = records
                .iter()
                .filter(|r| r.get("operation") == Some(name))
                .collect();
            assert_eq!(matching.len(), 1, "{name} logged {} times", matching.len());
        }
        let ok = records.iter().find(|r| r.get("operation") == Some("ok")).unwrap();
        assert_eq!(ok.level, tracing::Level::INFO);
        let broken = records
            .iter()
            .find(|r| r.get("operation") == Some("broken"))
            .unwrap();
        assert_eq!(broken.level, tracing::Level::ERROR);
        assert_eq!(broken.get("error"), Some("flush failed"));
    }
}
