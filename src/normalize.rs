use serde_json::Value;

use crate::json_util::{non_empty_str, parse_f64, parse_u64};
use crate::types::{Side, SourceKind, TradeEvent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedRecord {
    #[error("fill record is not a JSON object")]
    NotAnObject,
    #[error("fill record missing `{0}`")]
    Missing(&'static str),
    #[error("fill record has invalid `{field}`: {value}")]
    Invalid { field: &'static str, value: String },
}

/// Converts one raw fill record into a [`TradeEvent`].
///
/// Polled and pushed fills share the exchange's fill schema; numeric fields
/// arrive either as JSON numbers or as decimal strings. `coin`, `time`, `side`
/// and `sz` are required. A missing `px` reads as `0`.
pub fn normalize(raw: &Value, source: SourceKind) -> Result<TradeEvent, MalformedRecord> {
    let Some(obj) = raw.as_object() else {
        return Err(MalformedRecord::NotAnObject);
    };

    let asset = non_empty_str(obj.get("coin")).ok_or(MalformedRecord::Missing("coin"))?;

    let time = obj.get("time").ok_or(MalformedRecord::Missing("time"))?;
    let timestamp_ms = parse_u64(Some(time)).ok_or_else(|| invalid("time", time))?;

    let side_raw = obj.get("side").ok_or(MalformedRecord::Missing("side"))?;
    let side = side_raw
        .as_str()
        .and_then(Side::from_code)
        .ok_or_else(|| invalid("side", side_raw))?;

    let sz = obj.get("sz").ok_or(MalformedRecord::Missing("sz"))?;
    let size = parse_f64(Some(sz))
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| invalid("sz", sz))?;

    let price = match obj.get("px") {
        None | Some(Value::Null) => 0.0,
        Some(px) => parse_f64(Some(px))
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid("px", px))?,
    };

    Ok(TradeEvent {
        asset: asset.to_string(),
        side,
        size,
        price,
        timestamp_ms,
        source,
    })
}

fn invalid(field: &'static str, v: &Value) -> MalformedRecord {
    MalformedRecord::Invalid {
        field,
        value: v.to_string(),
    }
}

/// Fill records carried by one `userFills` push message.
#[derive(Debug, Default, PartialEq)]
pub struct PushPayload {
    /// Historical backlog sent right after subscribing.
    pub is_snapshot: bool,
    pub records: Vec<Value>,
}

/// Accepts a bare fill, a list of fills, or the `{isSnapshot, user, fills}`
/// envelope the live stream uses.
pub fn split_push_payload(data: &Value) -> PushPayload {
    match data {
        Value::Array(items) => PushPayload {
            is_snapshot: false,
            records: items.clone(),
        },
        Value::Object(obj) => match obj.get("fills") {
            Some(Value::Array(items)) => PushPayload {
                is_snapshot: obj
                    .get("isSnapshot")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                records: items.clone(),
            },
            _ => PushPayload {
                is_snapshot: false,
                records: vec![data.clone()],
            },
        },
        _ => PushPayload::default(),
    }
}
