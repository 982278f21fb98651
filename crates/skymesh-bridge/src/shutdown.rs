//! Cancellation-aware waits shared by the reconnect and sweep loops.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleeps for `duration` unless shutdown is signalled first.
///
/// Returns false when the wait was cut short by shutdown.
pub async fn sleep_or_cancel(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => !shutdown.is_cancelled(),
    }
}
