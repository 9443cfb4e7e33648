//! Worker task lifecycle management.

use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns every worker task handle and the broadcast cancellation token.
///
/// Workers never detach: shutdown cancels the global token once and then
/// joins each task in spawn order with a bounded wait. A worker that fails
/// on its own is logged, not escalated; a worker that cannot be joined in
/// time is a fatal error.
pub struct TaskManager {
    workers: Vec<WorkerInfo>,
    pub global_token: CancellationToken,
    join_timeout: Duration,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            workers: Vec::new(),
            global_token: CancellationToken::new(),
            join_timeout: JOIN_TIMEOUT,
        }
    }

    #[cfg(test)]
    pub fn with_join_timeout(join_timeout: Duration) -> Self {
        Self {
            join_timeout,
            ..Self::new()
        }
    }

    /// Spawns a worker task under a child of the global cancellation token.
    ///
    /// The wrapper logs the exit status so a worker dying before shutdown is
    /// always surfaced in the log, without touching its siblings.
    pub fn spawn_worker<F, Fut>(&mut self, name: String, worker_fn: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let worker_token = self.global_token.child_token();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            info!("worker '{task_name}' started");
            match worker_fn(worker_token).await {
                Ok(()) => {
                    info!("worker '{task_name}' finished");
                    Ok(())
                }
                Err(e) => {
                    error!("worker '{task_name}' failed: {e:#}");
                    Err(e)
                }
            }
        });

        self.workers.push(WorkerInfo { name, handle });
    }

    /// Broadcasts cancellation and joins every worker in spawn order.
    ///
    /// Individual worker failures were already logged by the spawn wrapper
    /// and do not fail the shutdown; a join timeout does.
    pub async fn shutdown_all(&mut self) -> Result<()> {
        info!("stopping all {} workers", self.workers.len());

        self.global_token.cancel();

        for WorkerInfo { name, handle } in self.workers.drain(..) {
            match tokio::time::timeout(self.join_timeout, handle).await {
                Ok(Ok(_exit_status)) => {}
                Ok(Err(e)) => {
                    warn!("worker '{name}' panicked during shutdown: {e}");
                }
                Err(_) => {
                    return Err(anyhow::anyhow!(
                        "worker '{name}' did not stop within {:?}",
                        self.join_timeout
                    ))
                    .context("shutdown join timeout");
                }
            }
        }

        info!("all workers stopped");
        Ok(())
    }

    /// Count of workers that have not been joined yet.
    pub fn active_count(&self) -> usize {
        self.workers.len()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

struct WorkerInfo {
    name: String,
    handle: JoinHandle<Result<()>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    #[tokio::test]
    async fn workers_observe_cancellation_and_join() {
        let mut manager = TaskManager::new();
        let observed = Arc::new(AtomicBool::new(false));

        let flag = observed.clone();
        manager.spawn_worker("cancellable".to_string(), move |token| async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(manager.active_count(), 1);
        manager.shutdown_all().await.unwrap();

        assert!(observed.load(Ordering::SeqCst));
        assert_eq!(manager.active_count(), 0);
    }

    #[tokio::test]
    async fn failed_worker_does_not_fail_shutdown() {
        let mut manager = TaskManager::new();

        manager.spawn_worker("doomed".to_string(), |_token| async {
            Err(anyhow::anyhow!("backlight vanished"))
        });
        manager.spawn_worker("healthy".to_string(), |token| async move {
            token.cancelled().await;
            Ok(())
        });

        assert!(manager.shutdown_all().await.is_ok());
    }

    #[tokio::test]
    async fn worker_ignoring_cancellation_times_out() {
        let mut manager = TaskManager::with_join_timeout(Duration::from_millis(50));

        manager.spawn_worker("stuck".to_string(), |_token| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });

        let result = manager.shutdown_all().await;
        assert!(result.is_err());
        assert!(format!("{:#}", result.unwrap_err()).contains("timeout"));
    }

    #[tokio::test]
    async fn worker_spawned_after_cancellation_terminates_immediately() {
        let mut manager = TaskManager::new();
        manager.global_token.cancel();

        manager.spawn_worker("late".to_string(), |token| async move {
            token.cancelled().await;
            Ok(())
        });

        manager.shutdown_all().await.unwrap();
    }
}
