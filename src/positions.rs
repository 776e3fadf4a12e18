use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde_json::Value;
use tokio::sync::watch;
use tracing::warn;

use crate::format;
use crate::health::HealthCounters;
use crate::hyperliquid::InfoApi;
use crate::json_util::{non_empty_str, parse_f64};
use crate::notify::Notifier;
use crate::types::PositionEntry;

/// Extracts open positions from a `clearinghouseState` response.
///
/// Entries without a coin or a parseable size are skipped; missing entry price
/// or PnL read as 0.
pub fn parse_positions(state: &Value) -> anyhow::Result<Vec<PositionEntry>> {
    let list = state
        .get("assetPositions")
        .and_then(Value::as_array)
        .context("clearinghouseState: missing assetPositions")?;

    let mut out = Vec::with_capacity(list.len());
    for item in list {
        let pos = item.get("position").unwrap_or(item);
        let Some(asset) = non_empty_str(pos.get("coin")) else {
            warn!(entry = %item, "position without coin; skipping");
            continue;
        };
        let Some(signed_size) = parse_f64(pos.get("szi")).filter(|v| v.is_finite()) else {
            warn!(coin = %asset, "position without size; skipping");
            continue;
        };
        out.push(PositionEntry {
            asset: asset.to_string(),
            signed_size,
            entry_price: parse_f64(pos.get("entryPx")).unwrap_or(0.0),
            unrealized_pnl: parse_f64(pos.get("unrealizedPnl")).unwrap_or(0.0),
        });
    }
    Ok(out)
}

/// Snapshot reporter. Every tick is sent, identical or not.
pub struct PositionReporter<A, N> {
    api: Arc<A>,
    notifier: Arc<N>,
    address: String,
}

impl<A: InfoApi, N: Notifier> PositionReporter<A, N> {
    pub fn new(api: Arc<A>, notifier: Arc<N>, address: String) -> Self {
        Self {
            api,
            notifier,
            address,
        }
    }

    /// Errors only when the snapshot cannot be fetched or parsed; a failed send
    /// is logged and swallowed.
    pub async fn report_once(&self) -> anyhow::Result<usize> {
        let state = self
            .api
            .clearinghouse_state(&self.address)
            .await
            .context("fetch clearinghouse state")?;
        let positions = parse_positions(&state)?;

        let text = format::positions_message(&positions);
        if let Err(e) = self.notifier.send(&text).await {
            warn!(error = %format!("{e:#}"), "position report notification failed");
        }
        Ok(positions.len())
    }
}

pub async fn run_position_reporter<A: InfoApi, N: Notifier>(
    reporter: PositionReporter<A, N>,
    every: Duration,
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

        match reporter.report_once().await {
            Ok(_) => health.inc_positions_reported(1),
            Err(e) => warn!(error = %format!("{e:#}"), "position check failed"),
        }
    }

    Ok(())
}
