use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;
use tracing::info;

use crate::eth;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hyperliquid: HyperliquidConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
}

impl Config {
    /// Reads `path` if it exists; a missing file means all defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let cfg = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read {}", path.display()))?;
            Self::from_toml(&raw).with_context(|| format!("parse {}", path.display()))?
        } else {
            info!(path = %path.display(), "config file not found; using defaults");
            Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.watch.poll_interval_ms == 0 {
            anyhow::bail!("invalid watch.poll_interval_ms=0 (must be > 0)");
        }
        if self.watch.poll_take == 0 {
            anyhow::bail!("invalid watch.poll_take=0 (must be > 0)");
        }
        if self.watch.position_interval_ms == 0 {
            anyhow::bail!("invalid watch.position_interval_ms=0 (must be > 0)");
        }
        if self.watch.ws_ping_interval_ms == 0 {
            anyhow::bail!("invalid watch.ws_ping_interval_ms=0 (must be > 0)");
        }
        if self.watch.heartbeat_interval_ms == 0 {
            anyhow::bail!("invalid watch.heartbeat_interval_ms=0 (must be > 0)");
        }
        if self.watch.ingest_queue == 0 {
            anyhow::bail!("invalid watch.ingest_queue=0 (must be > 0)");
        }
        for (name, url) in [
            ("hyperliquid.api_base", &self.hyperliquid.api_base),
            ("hyperliquid.ws_base", &self.hyperliquid.ws_base),
            ("telegram.api_base", &self.telegram.api_base),
        ] {
            if url.trim().is_empty() {
                anyhow::bail!("{name} must not be empty");
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct HyperliquidConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_ws_base")]
    pub ws_base: String,
    /// Default timeout applied to all HTTP requests (ms).
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    /// TCP connect timeout for HTTP requests (ms).
    #[serde(default = "default_http_connect_timeout_ms")]
    pub http_connect_timeout_ms: u64,
    /// WebSocket connect timeout (ms).
    #[serde(default = "default_ws_connect_timeout_ms")]
    pub ws_connect_timeout_ms: u64,
    /// WebSocket write timeout for subscribe/ping (ms).
    #[serde(default = "default_ws_write_timeout_ms")]
    pub ws_write_timeout_ms: u64,
}

impl Default for HyperliquidConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            ws_base: default_ws_base(),
            http_timeout_ms: default_http_timeout_ms(),
            http_connect_timeout_ms: default_http_connect_timeout_ms(),
            ws_connect_timeout_ms: default_ws_connect_timeout_ms(),
            ws_write_timeout_ms: default_ws_write_timeout_ms(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.hyperliquid.xyz".to_string()
}

fn default_ws_base() -> String {
    "wss://api.hyperliquid.xyz/ws".to_string()
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

fn default_http_connect_timeout_ms() -> u64 {
    3_000
}

fn default_ws_connect_timeout_ms() -> u64 {
    10_000
}

fn default_ws_write_timeout_ms() -> u64 {
    3_000
}

#[derive(Clone, Debug, Deserialize)]
pub struct WatchConfig {
    /// Env var holding the watched address.
    #[serde(default = "default_address_env")]
    pub address_env: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How many of the most recent fills each poll looks at.
    #[serde(default = "default_poll_take")]
    pub poll_take: usize,
    #[serde(default = "default_position_interval_ms")]
    pub position_interval_ms: u64,
    /// Fixed delay before every reconnect attempt.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_ws_ping_interval_ms")]
    pub ws_ping_interval_ms: u64,
    /// Ignore the historical backlog pushed right after subscribing.
    #[serde(default = "default_skip_snapshot")]
    pub skip_snapshot: bool,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Upper bound on waiting for the shutdown / crash notice to go out.
    #[serde(default = "default_notice_timeout_ms")]
    pub notice_timeout_ms: u64,
    #[serde(default = "default_ingest_queue")]
    pub ingest_queue: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            address_env: default_address_env(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_take: default_poll_take(),
            position_interval_ms: default_position_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            ws_ping_interval_ms: default_ws_ping_interval_ms(),
            skip_snapshot: default_skip_snapshot(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            notice_timeout_ms: default_notice_timeout_ms(),
            ingest_queue: default_ingest_queue(),
        }
    }
}

fn default_address_env() -> String {
    "HL_WATCH_ADDRESS".to_string()
}

fn default_poll_interval_ms() -> u64 {
    60_000
}

fn default_poll_take() -> usize {
    10
}

fn default_position_interval_ms() -> u64 {
    300_000
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_ws_ping_interval_ms() -> u64 {
    30_000
}

fn default_skip_snapshot() -> bool {
    true
}

fn default_heartbeat_interval_ms() -> u64 {
    600_000
}

fn default_notice_timeout_ms() -> u64 {
    3_000
}

fn default_ingest_queue() -> usize {
    1_024
}

#[derive(Clone, Debug, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,
    #[serde(default = "default_chat_id_env")]
    pub chat_id_env: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_telegram_api_base(),
            bot_token_env: default_bot_token_env(),
            chat_id_env: default_chat_id_env(),
        }
    }
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_bot_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".to_string()
}

fn default_chat_id_env() -> String {
    "TELEGRAM_CHAT_ID".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Env var that overrides `enabled` when set.
    #[serde(default = "default_mirror_enabled_env")]
    pub enabled_env: String,
    /// Env var name holding the signing key (hex, 32 bytes).
    #[serde(default = "default_mirror_private_key_env")]
    pub private_key_env: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            enabled_env: default_mirror_enabled_env(),
            private_key_env: default_mirror_private_key_env(),
        }
    }
}

fn default_mirror_enabled_env() -> String {
    "MIRROR_TRADES".to_string()
}

fn default_mirror_private_key_env() -> String {
    "MIRROR_PRIVATE_KEY".to_string()
}

#[derive(Clone)]
pub struct TelegramCreds {
    pub bot_token: String,
    pub chat_id: String,
}

impl std::fmt::Debug for TelegramCreds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramCreds")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// Values that only ever come from the environment.
#[derive(Clone)]
pub struct Secrets {
    /// Lowercase `0x` hex.
    pub address: String,
    pub telegram: Option<TelegramCreds>,
    pub mirror_enabled: bool,
    pub mirror_key: Option<String>,
}

impl Secrets {
    pub fn from_env(cfg: &Config, dry_run: bool) -> anyhow::Result<Self> {
        Self::from_lookup(cfg, dry_run, |name| std::env::var(name).ok())
    }

    /// Telegram credentials are required unless `dry_run` is set.
    pub fn from_lookup(
        cfg: &Config,
        dry_run: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let address_env = cfg.watch.address_env.trim();
        let address = get(address_env)
            .with_context(|| format!("missing watched address env var: {address_env}"))?;
        eth::parse_hex_20(&address)
            .with_context(|| format!("{address_env} must be a 0x-prefixed 20-byte hex address"))?;
        let address = address.to_ascii_lowercase();

        let telegram = match (
            get(cfg.telegram.bot_token_env.as_str()),
            get(cfg.telegram.chat_id_env.as_str()),
        ) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramCreds { bot_token, chat_id }),
            _ if dry_run => None,
            _ => anyhow::bail!(
                "missing Telegram credentials: set {} and {} (or run with --dry-run)",
                cfg.telegram.bot_token_env,
                cfg.telegram.chat_id_env
            ),
        };

        let mirror_enabled = match get(cfg.mirror.enabled_env.as_str()) {
            Some(v) => parse_bool(&v).with_context(|| {
                format!("{} must be a boolean, got {v:?}", cfg.mirror.enabled_env)
            })?,
            None => cfg.mirror.enabled,
        };

        Ok(Self {
            address,
            telegram,
            mirror_enabled,
            mirror_key: get(cfg.mirror.private_key_env.as_str()),
        })
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
