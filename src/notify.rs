//! Outbound notification sinks.
//!
//! Delivery is fire-and-forget: callers log a failed send and move on, nothing
//! is retried.

use std::future::Future;
use std::time::Duration;

use anyhow::Context as _;
use tracing::{info, warn};

use crate::config::{HyperliquidConfig, TelegramConfig, TelegramCreds};

pub trait Notifier: Send + Sync + 'static {
    /// Sends one HTML-formatted message.
    fn send(&self, text: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(
        cfg: &TelegramConfig,
        http: &HyperliquidConfig,
        creds: &TelegramCreds,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fillwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(http.http_timeout_ms))
            .connect_timeout(Duration::from_millis(http.http_connect_timeout_ms))
            .build()
            .context("build telegram http client")?;
        let url = format!(
            "{}/bot{}/sendMessage",
            cfg.api_base.trim_end_matches('/'),
            creds.bot_token
        );
        Ok(Self {
            client,
            url,
            chat_id: creds.chat_id.clone(),
        })
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        // The URL embeds the bot token; keep it out of error chains.
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("telegram unreachable: {}", e.without_url()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("telegram rejected message: HTTP {status}: {body}");
        }
        Ok(())
    }
}

/// Logs messages instead of delivering them (`--dry-run`).
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        info!(%text, "dry-run notification");
        Ok(())
    }
}

pub enum Sink {
    Telegram(TelegramNotifier),
    Log(LogNotifier),
}

impl Notifier for Sink {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        match self {
            Sink::Telegram(t) => t.send(text).await,
            Sink::Log(l) => l.send(text).await,
        }
    }
}

/// Sends with a bounded wait; failures and timeouts are logged and reported as
/// `false`.
pub async fn send_best_effort<N: Notifier>(notifier: &N, text: &str, wait: Duration) -> bool {
    match tokio::time::timeout(wait, notifier.send(text)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %format!("{e:#}"), "notification failed");
            false
        }
        Err(_) => {
            warn!(wait_ms = wait.as_millis() as u64, "notification timed out");
            false
        }
    }
}
