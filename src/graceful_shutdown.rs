//! Process-wide stop flag shared by every long-running task, plus the exit
//! paths that use it.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::format;
use crate::notify::{self, Notifier};

pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

pub fn request(tx: &watch::Sender<bool>) {
    let _ = tx.send(true);
}

pub fn is_requested(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}

/// Orderly stop: the shutdown notice goes out first (bounded by `wait`),
/// then the flag is raised and the stream supervisor gets up to `wait` to
/// close its socket. Other tasks are left to the runtime.
///
/// Returns whether the supervisor finished in time.
pub async fn wind_down<N: Notifier>(
    notifier: &N,
    tx: &watch::Sender<bool>,
    stream: &mut JoinHandle<anyhow::Result<()>>,
    wait: Duration,
) -> bool {
    notify::send_best_effort(notifier, &format::shutdown_message(), wait).await;
    request(tx);

    if stream.is_finished() {
        return true;
    }
    match tokio::time::timeout(wait, stream).await {
        Ok(Ok(Ok(()))) => true,
        Ok(Ok(Err(e))) => {
            warn!(error = %format!("{e:#}"), "ws supervisor ended with error");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "ws supervisor join failed");
            true
        }
        Err(_) => {
            info!(wait_ms = wait.as_millis() as u64, "ws supervisor still closing; leaving it");
            false
        }
    }
}

/// Awaits the watcher; a top-level error is logged and announced with a crash
/// notice before being returned unchanged.
pub async fn crash_guard<N, F>(notifier: &N, wait: Duration, watcher: F) -> anyhow::Result<()>
where
    N: Notifier,
    F: Future<Output = anyhow::Result<()>>,
{
    let res = watcher.await;
    if let Err(e) = &res {
        error!(error = %format!("{e:#}"), "watcher crashed");
        notify::send_best_effort(notifier, &format::crash_message(e), wait).await;
    }
    res
}
