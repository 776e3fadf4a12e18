//! Telegram HTML message bodies.

use crate::types::{Direction, PositionEntry, Side, TradeEvent};

pub fn trade_message(ev: &TradeEvent) -> String {
    let emoji = match ev.side {
        Side::Buy => "🟢",
        Side::Sell => "🔴",
    };
    format!(
        "{emoji} <b>{side} {asset}</b>\nSize: {size}\nPrice: {price}\nValue: {value}\nTime: {time}",
        side = ev.side.as_str(),
        asset = escape_html(&ev.asset),
        size = fmt_amount(ev.size),
        price = fmt_usd(ev.price),
        value = fmt_usd(ev.usd_value()),
        time = utc_timestamp(ev.timestamp_ms),
    )
}

pub fn positions_message(entries: &[PositionEntry]) -> String {
    if entries.is_empty() {
        return "📊 No open positions".to_string();
    }

    let mut out = String::from("📊 <b>Open positions</b>");
    for p in entries {
        let emoji = match p.direction() {
            Direction::Long => "🟢",
            Direction::Short => "🔴",
        };
        out.push_str(&format!(
            "\n\n{emoji} <b>{dir} {asset}</b>\nSize: {size}\nEntry: {entry}\nuPnL: {pnl}",
            dir = p.direction().as_str(),
            asset = escape_html(&p.asset),
            size = fmt_amount(p.signed_size.abs()),
            entry = fmt_usd(p.entry_price),
            pnl = fmt_signed_usd(p.unrealized_pnl),
        ));
    }
    out
}

pub fn startup_message(address: &str, mirror_armed: bool) -> String {
    let mode = if mirror_armed { "notify + mirror" } else { "notify only" };
    format!(
        "👀 <b>Watcher started</b>\nAddress: <code>{}</code>\nMode: {mode}",
        escape_html(address)
    )
}

pub fn shutdown_message() -> String {
    "🛑 <b>Watcher shutting down</b>".to_string()
}

pub fn crash_message(err: &anyhow::Error) -> String {
    format!(
        "💥 <b>Watcher crashed</b>\n<code>{}</code>",
        escape_html(&format!("{err:#}"))
    )
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// At least two decimals, up to six, trailing zeros trimmed past the second.
pub fn fmt_amount(v: f64) -> String {
    let (sign, int, frac) = split_decimal(v);
    format!("{sign}{}.{frac}", group_thousands(&int))
}

pub fn fmt_usd(v: f64) -> String {
    let (sign, int, frac) = split_decimal(v);
    format!("{sign}${}.{frac}", group_thousands(&int))
}

fn fmt_signed_usd(v: f64) -> String {
    if v > 0.0 {
        format!("+{}", fmt_usd(v))
    } else {
        fmt_usd(v)
    }
}

fn split_decimal(v: f64) -> (&'static str, String, String) {
    let sign = if v < 0.0 { "-" } else { "" };
    let s = format!("{:.6}", v.abs());
    let (int, frac) = s.split_once('.').unwrap_or((s.as_str(), "000000"));
    let mut frac = frac.trim_end_matches('0').to_string();
    while frac.len() < 2 {
        frac.push('0');
    }
    if sign == "-" && int == "0" && frac.bytes().all(|b| b == b'0') {
        return ("", int.to_string(), frac);
    }
    (sign, int.to_string(), frac)
}

fn group_thousands(int: &str) -> String {
    let mut out = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `YYYY-MM-DD HH:MM:SS UTC`.
pub fn utc_timestamp(ts_ms: u64) -> String {
    let secs = (ts_ms / 1000) as i64;
    let days = secs.div_euclid(86_400);
    let sec_of_day = secs.rem_euclid(86_400);
    let hour = sec_of_day / 3600;
    let minute = (sec_of_day % 3600) / 60;
    let second = sec_of_day % 60;
    let (year, month, day) = civil_from_days(days);
    format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02} UTC")
}

// UTC date conversion (Howard Hinnant's algorithm).
// Input: days since 1970-01-01.
fn civil_from_days(days_since_epoch: i64) -> (i32, u32, u32) {
    let z = days_since_epoch + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 }.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096).div_euclid(365);
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2).div_euclid(153);
    let d = doy - (153 * mp + 2).div_euclid(5) + 1;
    let m = mp + if mp < 10 { 3 } else { -9 };
    let year = y + i64::from(m <= 2);
    (year as i32, m as u32, d as u32)
}
