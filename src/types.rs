//! Canonical shapes shared by the poller, the push stream and the coordinator.
//!
//! Prices and sizes are `f64` end to end. Identity never compares floats with
//! `==`; it hashes the bit pattern of the normalized size instead.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Exchange side codes: `B` is the bid (buy), `A` the ask (sell).
    pub fn from_code(code: &str) -> Option<Side> {
        match code.trim() {
            "B" | "b" | "Buy" | "buy" | "BUY" | "bid" => Some(Side::Buy),
            "A" | "a" | "S" | "s" | "Sell" | "sell" | "SELL" | "ask" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which producer observed a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Poll,
    Push,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Poll => "poll",
            SourceKind::Push => "push",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TradeEvent {
    pub asset: String,
    pub side: Side,
    pub size: f64,
    pub price: f64,
    pub timestamp_ms: u64,
    pub source: SourceKind,
}

impl TradeEvent {
    pub fn usd_value(&self) -> f64 {
        self.price * self.size
    }

    pub fn identity(&self) -> EventId {
        EventId::new(&self.asset, self.timestamp_ms, self.side, self.size)
    }
}

/// Composite fill identity `(asset, timestamp, side, size)`.
///
/// Heuristic: two distinct fills of the same asset, side and size in the same
/// millisecond collapse into one identity. Source and price are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventId {
    asset: String,
    timestamp_ms: u64,
    side: Side,
    size_bits: u64,
}

impl EventId {
    pub fn new(asset: &str, timestamp_ms: u64, side: Side, size: f64) -> Self {
        // `+ 0.0` folds -0.0 into 0.0 so both hash alike.
        Self {
            asset: asset.to_string(),
            timestamp_ms,
            side,
            size_bits: (size + 0.0).to_bits(),
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.asset,
            self.timestamp_ms,
            self.side,
            f64::from_bits(self.size_bits)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PositionEntry {
    pub asset: String,
    pub signed_size: f64,
    pub entry_price: f64,
    pub unrealized_pnl: f64,
}

impl PositionEntry {
    pub fn direction(&self) -> Direction {
        if self.signed_size < 0.0 {
            Direction::Short
        } else {
            Direction::Long
        }
    }
}

/// One entry of the exchange `universe` list.
///
/// Held by the poller as the cold-start market cache. Message formatting does
/// not consult it: sizes are printed as the exchange reports them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetMeta {
    pub name: String,
    pub sz_decimals: u32,
}

pub fn now_ms() -> u64 {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    d.as_millis() as u64
}
