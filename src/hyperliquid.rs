//! Request/response side of the exchange `info` API.

use std::future::Future;
use std::time::Duration;

use anyhow::Context as _;
use serde_json::{json, Value};

use crate::config::HyperliquidConfig;
use crate::types::AssetMeta;

/// Read-only queries the watcher needs from the exchange.
pub trait InfoApi: Send + Sync + 'static {
    fn market_meta(&self) -> impl Future<Output = anyhow::Result<Vec<AssetMeta>>> + Send;

    /// Raw fill records in API order.
    fn user_fills(&self, user: &str) -> impl Future<Output = anyhow::Result<Vec<Value>>> + Send;

    fn clearinghouse_state(&self, user: &str) -> impl Future<Output = anyhow::Result<Value>> + Send;
}

pub struct InfoClient {
    client: reqwest::Client,
    url: String,
}

impl InfoClient {
    pub fn new(cfg: &HyperliquidConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fillwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(cfg.http_timeout_ms))
            .connect_timeout(Duration::from_millis(cfg.http_connect_timeout_ms))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            url: format!("{}/info", cfg.api_base.trim_end_matches('/')),
        })
    }

    async fn post_info(&self, body: Value) -> anyhow::Result<Value> {
        let kind = body
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string();
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("info {kind} request"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("info {kind} failed: HTTP {status}: {text}");
        }

        resp.json()
            .await
            .with_context(|| format!("decode info {kind} response"))
    }
}

impl InfoApi for InfoClient {
    async fn market_meta(&self) -> anyhow::Result<Vec<AssetMeta>> {
        let v = self.post_info(json!({"type": "metaAndAssetCtxs"})).await?;
        parse_universe(&v)
    }

    async fn user_fills(&self, user: &str) -> anyhow::Result<Vec<Value>> {
        let v = self
            .post_info(json!({"type": "userFills", "user": user}))
            .await?;
        match v {
            Value::Array(items) => Ok(items),
            other => anyhow::bail!("userFills: expected array, got {}", type_name(&other)),
        }
    }

    async fn clearinghouse_state(&self, user: &str) -> anyhow::Result<Value> {
        self.post_info(json!({"type": "clearinghouseState", "user": user}))
            .await
    }
}

/// `metaAndAssetCtxs` answers `[meta, assetCtxs]`; a bare `meta` object is
/// accepted too.
pub fn parse_universe(v: &Value) -> anyhow::Result<Vec<AssetMeta>> {
    let meta = match v {
        Value::Array(parts) => parts.first().context("metaAndAssetCtxs: empty response")?,
        other => other,
    };
    let universe = meta
        .get("universe")
        .and_then(Value::as_array)
        .context("metaAndAssetCtxs: missing universe")?;

    Ok(universe
        .iter()
        .filter_map(|a| {
            let name = a.get("name")?.as_str()?.to_string();
            let sz_decimals = a
                .get("szDecimals")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
            Some(AssetMeta { name, sz_decimals })
        })
        .collect())
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
