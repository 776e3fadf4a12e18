#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fillwatch::hyperliquid::InfoApi;
use fillwatch::mirror::MirrorHook;
use fillwatch::notify::Notifier;
use fillwatch::types::{AssetMeta, TradeEvent};
use serde_json::{json, Value};

/// Records every message; fails when `fail` is set.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
    pub attempts: AtomicUsize,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        let n = Self::default();
        n.fail.store(true, Ordering::SeqCst);
        n
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().expect("lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("sink unavailable");
        }
        self.sent.lock().expect("lock").push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMirror {
    pub armed: bool,
    pub fail: bool,
    pub mirrored: Arc<Mutex<Vec<TradeEvent>>>,
}

impl RecordingMirror {
    pub fn armed() -> Self {
        Self {
            armed: true,
            ..Self::default()
        }
    }
}

impl MirrorHook for RecordingMirror {
    fn is_armed(&self) -> bool {
        self.armed
    }

    async fn mirror(&self, ev: &TradeEvent) -> anyhow::Result<()> {
        self.mirrored.lock().expect("lock").push(ev.clone());
        if self.fail {
            anyhow::bail!("exchange rejected order");
        }
        Ok(())
    }
}

/// Replays queued responses; an empty queue answers with an error.
#[derive(Default)]
pub struct ScriptedApi {
    pub meta_calls: AtomicUsize,
    pub meta_fail: AtomicBool,
    pub fills: Mutex<VecDeque<anyhow::Result<Vec<Value>>>>,
    pub states: Mutex<VecDeque<anyhow::Result<Value>>>,
}

impl ScriptedApi {
    pub fn push_fills(&self, fills: Vec<Value>) {
        self.fills.lock().expect("lock").push_back(Ok(fills));
    }

    pub fn push_fills_err(&self, msg: &str) {
        self.fills
            .lock()
            .expect("lock")
            .push_back(Err(anyhow::anyhow!(msg.to_string())));
    }

    pub fn push_state(&self, state: Value) {
        self.states.lock().expect("lock").push_back(Ok(state));
    }
}

impl InfoApi for ScriptedApi {
    async fn market_meta(&self) -> anyhow::Result<Vec<AssetMeta>> {
        self.meta_calls.fetch_add(1, Ordering::SeqCst);
        if self.meta_fail.load(Ordering::SeqCst) {
            anyhow::bail!("metaAndAssetCtxs: HTTP 503");
        }
        Ok(vec![
            AssetMeta {
                name: "BTC".to_string(),
                sz_decimals: 5,
            },
            AssetMeta {
                name: "ETH".to_string(),
                sz_decimals: 4,
            },
        ])
    }

    async fn user_fills(&self, _user: &str) -> anyhow::Result<Vec<Value>> {
        self.fills
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted fills")))
    }

    async fn clearinghouse_state(&self, _user: &str) -> anyhow::Result<Value> {
        self.states
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted state")))
    }
}

pub fn fill(coin: &str, time: u64, side: &str, sz: &str, px: &str) -> Value {
    json!({"coin": coin, "time": time, "side": side, "sz": sz, "px": px})
}
