// Wire codec: one JSON text frame -> one order-book snapshot

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::{SimError, SimResult};
use crate::types::{BookLevel, OrderBookSnapshot};

/// Inbound frame layout. Prices and sizes arrive as strings so they can be
/// parsed into exact decimals instead of binary floats.
#[derive(Debug, Deserialize)]
struct WireSnapshot {
    timestamp: String,
    exchange: String,
    symbol: String,
    asks: Vec<(String, String)>,
    bids: Vec<(String, String)>,
}

/// Decode one text frame into a snapshot.
///
/// Any failure here is recoverable for the feed: the frame is dropped and
/// the previous snapshot stays authoritative. No ordering of levels is
/// assumed from the wire.
pub fn decode_frame(text: &str) -> SimResult<OrderBookSnapshot> {
    let wire: WireSnapshot = serde_json::from_str(text)?;

    let timestamp = parse_timestamp(&wire.timestamp)?;
    let asks = parse_levels(&wire.asks, "ask")?;
    let bids = parse_levels(&wire.bids, "bid")?;

    Ok(OrderBookSnapshot {
        timestamp,
        exchange: wire.exchange,
        symbol: wire.symbol,
        asks,
        bids,
    })
}

fn parse_timestamp(raw: &str) -> SimResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SimError::Parse(format!("bad timestamp '{}': {}", raw, e)))
}

fn parse_levels(pairs: &[(String, String)], side: &str) -> SimResult<Vec<BookLevel>> {
    pairs
        .iter()
        .map(|(price, size)| {
            Ok(BookLevel {
                price: parse_decimal(price, side, "price")?,
                size: parse_decimal(size, side, "size")?,
            })
        })
        .collect()
}

fn parse_decimal(raw: &str, side: &str, field: &str) -> SimResult<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| SimError::Parse(format!("bad {} {} '{}': {}", side, field, raw, e)))
}
