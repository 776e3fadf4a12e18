use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::types::now_ms;

#[derive(Default)]
pub struct HealthCounters {
    fills_notified: AtomicU64,
    fills_duplicate: AtomicU64,
    fills_malformed: AtomicU64,
    notify_failed: AtomicU64,
    mirror_fired: AtomicU64,
    mirror_failed: AtomicU64,
    polls_ok: AtomicU64,
    polls_failed: AtomicU64,
    ws_connects: AtomicU64,
    ws_messages: AtomicU64,
    positions_reported: AtomicU64,
    last_fill_ms: AtomicU64,
}

impl HealthCounters {
    pub fn inc_fills_notified(&self, n: u64) {
        self.fills_notified.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_fills_duplicate(&self, n: u64) {
        self.fills_duplicate.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_fills_malformed(&self, n: u64) {
        self.fills_malformed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_notify_failed(&self, n: u64) {
        self.notify_failed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_mirror_fired(&self, n: u64) {
        self.mirror_fired.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_mirror_failed(&self, n: u64) {
        self.mirror_failed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_polls_ok(&self, n: u64) {
        self.polls_ok.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_polls_failed(&self, n: u64) {
        self.polls_failed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_ws_connects(&self, n: u64) {
        self.ws_connects.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_ws_messages(&self, n: u64) {
        self.ws_messages.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_positions_reported(&self, n: u64) {
        self.positions_reported.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_last_fill_ms(&self, ts_ms: u64) {
        self.last_fill_ms.store(ts_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            ts_ms: now_ms(),
            fills_notified: self.fills_notified.load(Ordering::Relaxed),
            fills_duplicate: self.fills_duplicate.load(Ordering::Relaxed),
            fills_malformed: self.fills_malformed.load(Ordering::Relaxed),
            notify_failed: self.notify_failed.load(Ordering::Relaxed),
            mirror_fired: self.mirror_fired.load(Ordering::Relaxed),
            mirror_failed: self.mirror_failed.load(Ordering::Relaxed),
            polls_ok: self.polls_ok.load(Ordering::Relaxed),
            polls_failed: self.polls_failed.load(Ordering::Relaxed),
            ws_connects: self.ws_connects.load(Ordering::Relaxed),
            ws_messages: self.ws_messages.load(Ordering::Relaxed),
            positions_reported: self.positions_reported.load(Ordering::Relaxed),
            last_fill_ms: self.last_fill_ms.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub ts_ms: u64,
    pub fills_notified: u64,
    pub fills_duplicate: u64,
    pub fills_malformed: u64,
    pub notify_failed: u64,
    pub mirror_fired: u64,
    pub mirror_failed: u64,
    pub polls_ok: u64,
    pub polls_failed: u64,
    pub ws_connects: u64,
    pub ws_messages: u64,
    pub positions_reported: u64,
    pub last_fill_ms: u64,
}

/// Logs a counter snapshot every `every` until shutdown.
pub fn spawn_heartbeat(
    counters: Arc<HealthCounters>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        // First tick completes immediately; skip the all-zero line.
        tick.tick().await;
        loop {
            tokio::select! {
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() { break; }
                }
                _ = tick.tick() => {
                    let snap = counters.snapshot();
                    match serde_json::to_string(&snap) {
                        Ok(json) => info!(health = %json, "heartbeat"),
                        Err(e) => info!(error = %e, "heartbeat encode failed"),
                    }
                }
            }
        }
    })
}
