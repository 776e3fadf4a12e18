//! Single consumer of every fill batch.
//!
//! The poller and the push stream are producers on one `mpsc` channel; the
//! coordinator task owns the [`DedupLedger`] outright, so the membership check
//! and the insert for an identity always run back to back with no other
//! writer in between. Whichever producer delivers a fill first wins its
//! notification; later sightings are counted as duplicates.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::format;
use crate::health::HealthCounters;
use crate::ledger::DedupLedger;
use crate::mirror::MirrorHook;
use crate::normalize::normalize;
use crate::notify::Notifier;
use crate::types::{SourceKind, TradeEvent};

/// Raw fill records from one poll cycle or one push message, in source order.
#[derive(Debug, Clone)]
pub struct IngestBatch {
    pub source: SourceKind,
    pub records: Vec<Value>,
}

impl IngestBatch {
    pub fn new(source: SourceKind, records: Vec<Value>) -> Self {
        Self { source, records }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Fills seen for the first time (notification attempted).
    pub novel: usize,
    pub duplicates: usize,
    pub malformed: usize,
    /// Novel fills whose notification failed. Still recorded in the ledger.
    pub notify_failed: usize,
}

pub struct Coordinator<N, M> {
    ledger: DedupLedger,
    notifier: Arc<N>,
    mirror: M,
    health: Arc<HealthCounters>,
}

impl<N: Notifier, M: MirrorHook> Coordinator<N, M> {
    pub fn new(notifier: Arc<N>, mirror: M, health: Arc<HealthCounters>) -> Self {
        Self {
            ledger: DedupLedger::new(),
            notifier,
            mirror,
            health,
        }
    }

    pub fn seen_count(&self) -> usize {
        self.ledger.len()
    }

    pub async fn process_batch(&mut self, batch: IngestBatch) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for raw in &batch.records {
            let ev = match normalize(raw, batch.source) {
                Ok(ev) => ev,
                Err(e) => {
                    warn!(source = batch.source.as_str(), error = %e, record = %raw, "dropping malformed fill");
                    self.health.inc_fills_malformed(1);
                    outcome.malformed += 1;
                    continue;
                }
            };

            let id = ev.identity();
            if !self.ledger.check_and_insert(id.clone()) {
                debug!(source = batch.source.as_str(), %id, "duplicate fill suppressed");
                self.health.inc_fills_duplicate(1);
                outcome.duplicates += 1;
                continue;
            }

            outcome.novel += 1;
            if !self.deliver(&ev).await {
                outcome.notify_failed += 1;
            }
        }

        if outcome != BatchOutcome::default() {
            debug!(
                source = batch.source.as_str(),
                novel = outcome.novel,
                duplicates = outcome.duplicates,
                malformed = outcome.malformed,
                "batch processed"
            );
        }
        outcome
    }

    /// Notifies, then mirrors. Neither failure touches the ledger.
    async fn deliver(&self, ev: &TradeEvent) -> bool {
        info!(
            source = ev.source.as_str(),
            coin = %ev.asset,
            side = ev.side.as_str(),
            size = ev.size,
            price = ev.price,
            time = ev.timestamp_ms,
            "new fill"
        );
        self.health.set_last_fill_ms(ev.timestamp_ms);

        let text = format::trade_message(ev);
        let sent = match self.notifier.send(&text).await {
            Ok(()) => {
                self.health.inc_fills_notified(1);
                true
            }
            Err(e) => {
                warn!(coin = %ev.asset, error = %format!("{e:#}"), "fill notification failed");
                self.health.inc_notify_failed(1);
                false
            }
        };

        if self.mirror.is_armed() {
            match self.mirror.mirror(ev).await {
                Ok(()) => self.health.inc_mirror_fired(1),
                Err(e) => {
                    warn!(coin = %ev.asset, error = %format!("{e:#}"), "mirror trade failed");
                    self.health.inc_mirror_failed(1);
                }
            }
        }

        sent
    }

    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<IngestBatch>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                maybe = rx.recv() => {
                    let Some(batch) = maybe else {
                        break;
                    };
                    self.process_batch(batch).await;
                }
            }
        }

        info!(seen = self.ledger.len(), "coordinator stopped");
        Ok(())
    }
}
