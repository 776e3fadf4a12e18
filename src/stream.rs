//! Push-stream supervisor for the `userFills` subscription.
//!
//! Lifecycle:
//!
//! ```text
//! Disconnected --RetryElapsed--> Connecting --Opened--> Subscribed
//!      ^                             |                      |
//!      +------------Failed-----------+----------Failed------+
//! any --Shutdown--> Closed
//! ```
//!
//! The subscribe request goes out as soon as `Subscribed` is entered. Retries
//! never stop and wait [`ReconnectPolicy::delay_after`] each time. Only one
//! socket exists at a time: a session is fully dropped before the next
//! connect.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use futures_util::{SinkExt as _, StreamExt as _};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::coordinator::IngestBatch;
use crate::graceful_shutdown;
use crate::health::HealthCounters;
use crate::normalize::split_push_payload;
use crate::types::SourceKind;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Subscribed,
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    RetryElapsed,
    Opened,
    Failed,
    Shutdown,
}

impl StreamState {
    pub fn on(self, ev: StreamEvent) -> StreamState {
        use StreamEvent::*;
        use StreamState::*;
        match (self, ev) {
            (Closed, _) | (_, Shutdown) => Closed,
            (Disconnected, RetryElapsed) => Connecting,
            (Connecting, Opened) => Subscribed,
            (Connecting, Failed) | (Subscribed, Failed) => Disconnected,
            (s, _) => s,
        }
    }
}

/// How long to wait before reconnecting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    delay: Duration,
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// `failures` counts consecutive failed connects or sessions. The delay
    /// does not grow with it.
    pub fn delay_after(&self, _failures: u32) -> Duration {
        self.delay
    }
}

#[derive(Clone, Debug)]
pub struct StreamSettings {
    pub ws_url: String,
    pub address: String,
    pub policy: ReconnectPolicy,
    pub ping_interval: Duration,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub skip_snapshot: bool,
}

impl StreamSettings {
    pub fn from_config(cfg: &Config, address: &str) -> Self {
        Self {
            ws_url: cfg.hyperliquid.ws_base.clone(),
            address: address.to_string(),
            policy: ReconnectPolicy::fixed(Duration::from_millis(cfg.watch.reconnect_delay_ms)),
            ping_interval: Duration::from_millis(cfg.watch.ws_ping_interval_ms),
            connect_timeout: Duration::from_millis(cfg.hyperliquid.ws_connect_timeout_ms),
            write_timeout: Duration::from_millis(cfg.hyperliquid.ws_write_timeout_ms),
            skip_snapshot: cfg.watch.skip_snapshot,
        }
    }
}

pub fn subscribe_message(address: &str) -> Value {
    json!({
        "method": "subscribe",
        "subscription": {"type": "userFills", "user": address},
    })
}

fn ping_message() -> Value {
    json!({"method": "ping"})
}

pub async fn run_user_fills_stream(
    settings: StreamSettings,
    tx: mpsc::Sender<IngestBatch>,
    health: Arc<HealthCounters>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let mut state = StreamState::Connecting;
    let mut socket: Option<WsStream> = None;
    let mut failures: u32 = 0;

    loop {
        if graceful_shutdown::is_requested(&shutdown) || tx.is_closed() {
            state = state.on(StreamEvent::Shutdown);
        }

        state = match state {
            StreamState::Closed => break,
            StreamState::Disconnected => {
                let delay = settings.policy.delay_after(failures);
                info!(
                    delay_ms = delay.as_millis() as u64,
                    failures, "ws reconnect scheduled"
                );
                tokio::select! {
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            state.on(StreamEvent::Shutdown)
                        } else {
                            state
                        }
                    }
                    _ = tokio::time::sleep(delay) => state.on(StreamEvent::RetryElapsed),
                }
            }
            StreamState::Connecting => {
                info!(ws_url = %settings.ws_url, "connecting ws");
                match connect(&settings).await {
                    Ok(ws) => {
                        health.inc_ws_connects(1);
                        failures = 0;
                        socket = Some(ws);
                        state.on(StreamEvent::Opened)
                    }
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        error!(error = %format!("{e:#}"), "ws connect failed");
                        state.on(StreamEvent::Failed)
                    }
                }
            }
            StreamState::Subscribed => match socket.take() {
                Some(ws) => match run_session(ws, &settings, &tx, &health, &mut shutdown).await {
                    Ok(()) => state.on(StreamEvent::Shutdown),
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        error!(error = %format!("{e:#}"), "ws error; reconnecting");
                        state.on(StreamEvent::Failed)
                    }
                },
                None => state.on(StreamEvent::Failed),
            },
        };
    }

    info!("ws supervisor stopped");
    Ok(())
}

async fn connect(settings: &StreamSettings) -> anyhow::Result<WsStream> {
    let (ws, _) = tokio::time::timeout(
        settings.connect_timeout,
        tokio_tungstenite::connect_async(settings.ws_url.as_str()),
    )
    .await
    .context("ws connect timed out")?
    .context("connect ws")?;
    Ok(ws)
}

/// Runs one connection until it breaks (`Err`) or shutdown is requested
/// (`Ok`).
async fn run_session(
    ws: WsStream,
    settings: &StreamSettings,
    tx: &mpsc::Sender<IngestBatch>,
    health: &HealthCounters,
    shutdown: &mut watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let (mut sink, mut stream) = ws.split();

    let subscribe = subscribe_message(&settings.address);
    tokio::time::timeout(
        settings.write_timeout,
        sink.send(Message::Text(subscribe.to_string().into())),
    )
    .await
    .context("send subscribe timed out")?
    .context("send subscribe")?;
    info!(address = %settings.address, "subscribed to userFills");

    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );

    loop {
        tokio::select! {
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    let _ = tokio::time::timeout(settings.write_timeout, sink.send(Message::Close(None))).await;
                    return Ok(());
                }
            }
            _ = ping.tick() => {
                tokio::time::timeout(
                    settings.write_timeout,
                    sink.send(Message::Text(ping_message().to_string().into())),
                )
                .await
                .context("send ping timed out")?
                .context("send ping")?;
            }
            msg = stream.next() => {
                let Some(msg) = msg else {
                    return Err(anyhow::anyhow!("ws stream ended"));
                };
                let msg = msg.context("ws read")?;
                match msg {
                    Message::Text(txt) => {
                        handle_ws_text(&txt, settings, tx, health).await;
                    }
                    Message::Binary(bin) => {
                        let txt = String::from_utf8_lossy(&bin);
                        handle_ws_text(&txt, settings, tx, health).await;
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                    Message::Close(frame) => {
                        return Err(anyhow::anyhow!("ws close: {frame:?}"));
                    }
                    Message::Frame(_) => {}
                }
            }
        }
    }
}

async fn handle_ws_text(
    txt: &str,
    settings: &StreamSettings,
    tx: &mpsc::Sender<IngestBatch>,
    health: &HealthCounters,
) {
    health.inc_ws_messages(1);

    let v: Value = match serde_json::from_str(txt) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "ws non-json message");
            return;
        }
    };

    let channel = v.get("channel").and_then(Value::as_str).unwrap_or("");
    match channel {
        "userFills" => {
            let Some(data) = v.get("data") else {
                warn!("userFills message without data");
                return;
            };
            let payload = split_push_payload(data);
            if payload.is_snapshot && settings.skip_snapshot {
                debug!(fills = payload.records.len(), "ignoring userFills snapshot");
                return;
            }
            if payload.records.is_empty() {
                return;
            }
            // A closed receiver ends the supervisor on its next loop turn.
            let _ = tx
                .send(IngestBatch::new(SourceKind::Push, payload.records))
                .await;
        }
        "pong" | "subscriptionResponse" => {}
        "error" => warn!(message = %v, "ws error message"),
        other => debug!(channel = other, "ignoring ws message"),
    }
}
