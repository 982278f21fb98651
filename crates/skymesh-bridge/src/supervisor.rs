//! Restart-on-panic supervision for the long-running bridge tasks.
//!
//! Each task runs inside its own spawned future. A panic surfaces as a
//! [`JoinError`](tokio::task::JoinError) at the supervisor, which logs it, lets
//! the task release whatever resource it owned via [`Supervised::on_fault`],
//! waits a short delay and starts the task again. A task that returns normally
//! is not restarted.

use crate::metrics::BridgeMetrics;
use crate::shutdown::sleep_or_cancel;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Delay before restarting a task that panicked
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(1);

/// A background task the supervisor can restart
#[async_trait]
pub trait Supervised: Send + Sync + 'static {
    /// Name used in logs and metric labels
    fn name(&self) -> &'static str;

    /// Runs until `shutdown` is cancelled.
    async fn run(self: Arc<Self>, shutdown: CancellationToken);

    /// Called after a panic, before the restart.
    async fn on_fault(&self) {}
}

/// Spawns `task` under supervision.
pub fn spawn_supervised<T: Supervised>(
    task: Arc<T>,
    shutdown: CancellationToken,
    restart_delay: Duration,
    metrics: Arc<BridgeMetrics>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = task.name();
        let mut restarts: u32 = 0;

        loop {
            let attempt = tokio::spawn(Arc::clone(&task).run(shutdown.clone()));

            match attempt.await {
                Ok(()) => {
                    debug!(task = name, "Task finished");
                    break;
                }
                Err(e) if e.is_panic() => {
                    restarts = restarts.saturating_add(1);
                    error!(task = name, restarts, error = %e, "Task panicked");
                    metrics.record_task_restart(name);
                    task.on_fault().await;
                }
                Err(e) => {
                    warn!(task = name, error = %e, "Task cancelled");
                    break;
                }
            }

            if !sleep_or_cancel(restart_delay, &shutdown).await {
                break;
            }
            warn!(task = name, restarts, "Restarting task");
        }
    })
}
