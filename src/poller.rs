use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::coordinator::IngestBatch;
use crate::health::HealthCounters;
use crate::hyperliquid::InfoApi;
use crate::types::{AssetMeta, SourceKind};

/// Timer-driven producer of fill batches.
///
/// Market metadata is fetched once, before the first fills query, and kept
/// for the life of the process; listings that appear later are not picked up.
/// The cache only gates the cold start: a cycle whose metadata fetch fails
/// never queries fills, and nothing downstream reads the cached entries.
pub struct FillsPoller<A> {
    api: Arc<A>,
    address: String,
    take: usize,
    markets: Option<Vec<AssetMeta>>,
}

impl<A: InfoApi> FillsPoller<A> {
    pub fn new(api: Arc<A>, address: String, take: usize) -> Self {
        Self {
            api,
            address,
            take,
            markets: None,
        }
    }

    /// `None` until the first metadata fetch succeeds.
    pub fn cached_markets(&self) -> Option<&[AssetMeta]> {
        self.markets.as_deref()
    }

    /// Returns the first `take` fill records in API order.
    pub async fn poll_once(&mut self) -> anyhow::Result<Vec<Value>> {
        if self.markets.is_none() {
            let markets = self
                .api
                .market_meta()
                .await
                .context("fetch market metadata")?;
            info!(assets = markets.len(), "cached market metadata");
            self.markets = Some(markets);
        }

        let fills = self
            .api
            .user_fills(&self.address)
            .await
            .context("fetch user fills")?;
        let returned = fills.len();
        let recent: Vec<Value> = fills.into_iter().take(self.take).collect();
        debug!(returned, taken = recent.len(), "polled fills");
        Ok(recent)
    }
}

pub async fn run_fills_poller<A: InfoApi>(
    mut poller: FillsPoller<A>,
    every: Duration,
    tx: mpsc::Sender<IngestBatch>,
    health: Arc<HealthCounters>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {}
        }
        if *shutdown.borrow() {
            break;
        }

        let records = match poller.poll_once().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "poll cycle failed");
                health.inc_polls_failed(1);
                continue;
            }
        };
        health.inc_polls_ok(1);

        if records.is_empty() {
            continue;
        }
        if tx
            .send(IngestBatch::new(SourceKind::Poll, records))
            .await
            .is_err()
        {
            return Err(anyhow::anyhow!("ingest receiver dropped"));
        }
    }

    Ok(())
}
