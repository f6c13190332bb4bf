// Market microstructure metrics derived from a single snapshot.
// Pure functions: no mutation, no I/O.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{BookLevel, OrderBookSnapshot, Side};

/// Half-width of the depth band around mid, as a fraction of mid
const DEPTH_BAND: Decimal = dec!(0.02);

/// Book-walk result when a side cannot absorb the requested quantity.
/// A fixed 100% sentinel keeps downstream cost arithmetic finite instead
/// of letting the estimate grow without bound.
pub const INSUFFICIENT_LIQUIDITY_IMPACT_PCT: Decimal = dec!(100);

/// Metrics recomputed for every snapshot. Owned by the call that produced
/// them; nothing here is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketMetrics {
    pub spread: Decimal,
    pub mid_price: Decimal,
    /// Total bid + ask size within the band around mid
    pub depth: Decimal,
    /// (bid depth - ask depth) / (bid depth + ask depth), in [-1, 1]
    pub imbalance: Decimal,
    /// Relative spread in percent. A short-horizon liquidity proxy, not a
    /// statistical volatility estimate.
    pub volatility_proxy: Decimal,
}

impl MarketMetrics {
    /// "No data yet" value used when either side's best level is absent
    pub fn neutral() -> Self {
        Self {
            spread: Decimal::ZERO,
            mid_price: Decimal::ZERO,
            depth: Decimal::ZERO,
            imbalance: Decimal::ZERO,
            volatility_proxy: Decimal::ZERO,
        }
    }
}

/// Derive spread, mid, banded depth, imbalance and the volatility proxy.
///
/// A crossed book passes straight through: spread comes out <= 0 and the
/// consumer treats that as a data-quality signal.
pub fn compute(snapshot: &OrderBookSnapshot) -> MarketMetrics {
    let (best_ask, best_bid) = match (snapshot.best_ask(), snapshot.best_bid()) {
        (Some(ask), Some(bid)) => (ask, bid),
        _ => return MarketMetrics::neutral(),
    };

    let spread = best_ask.price - best_bid.price;
    let mid_price = (best_ask.price + best_bid.price) / dec!(2);

    let band = mid_price.abs() * DEPTH_BAND;
    let bid_depth = banded_size(&snapshot.bids, mid_price, band);
    let ask_depth = banded_size(&snapshot.asks, mid_price, band);
    let depth = bid_depth + ask_depth;

    let imbalance = if depth.is_zero() {
        Decimal::ZERO
    } else {
        (bid_depth - ask_depth) / depth
    };

    let volatility_proxy = if mid_price.is_zero() {
        Decimal::ZERO
    } else {
        spread / mid_price * dec!(100)
    };

    MarketMetrics {
        spread,
        mid_price,
        depth,
        imbalance,
        volatility_proxy,
    }
}

fn banded_size(levels: &[BookLevel], mid: Decimal, band: Decimal) -> Decimal {
    levels
        .iter()
        .filter(|l| l.size > Decimal::ZERO && (l.price - mid).abs() <= band)
        .map(|l| l.size)
        .sum()
}

/// Size-weighted average price over one side; zero for an empty side
pub fn vwap(snapshot: &OrderBookSnapshot, side: Side) -> Decimal {
    let levels = match side {
        Side::Buy => &snapshot.asks,
        Side::Sell => &snapshot.bids,
    };

    let mut notional = Decimal::ZERO;
    let mut total_size = Decimal::ZERO;
    for level in levels.iter().filter(|l| l.size > Decimal::ZERO) {
        notional += level.price * level.size;
        total_size += level.size;
    }

    if total_size.is_zero() {
        Decimal::ZERO
    } else {
        notional / total_size
    }
}

/// Walk one side of the book from the best level outward and report the
/// average fill price versus the best price, as a percentage.
///
/// Levels are re-sorted here; wire order is never trusted. If the side
/// cannot fill `quantity_base`, the fixed
/// [`INSUFFICIENT_LIQUIDITY_IMPACT_PCT`] sentinel is returned.
pub fn price_impact(snapshot: &OrderBookSnapshot, side: Side, quantity_base: Decimal) -> Decimal {
    if quantity_base <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let mut levels: Vec<&BookLevel> = match side {
        Side::Buy => &snapshot.asks,
        Side::Sell => &snapshot.bids,
    }
    .iter()
    .filter(|l| l.size > Decimal::ZERO)
    .collect();

    match side {
        Side::Buy => levels.sort_by(|a, b| a.price.cmp(&b.price)),
        Side::Sell => levels.sort_by(|a, b| b.price.cmp(&a.price)),
    }

    let best_price = match levels.first() {
        Some(level) => level.price,
        None => return INSUFFICIENT_LIQUIDITY_IMPACT_PCT,
    };
    if best_price.is_zero() {
        return Decimal::ZERO;
    }

    let mut remaining = quantity_base;
    let mut notional = Decimal::ZERO;
    for level in levels {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = remaining.min(level.size);
        notional += take * level.price;
        remaining -= take;
    }

    if remaining > Decimal::ZERO {
        return INSUFFICIENT_LIQUIDITY_IMPACT_PCT;
    }

    let average_fill = notional / quantity_base;
    let impact = match side {
        Side::Buy => (average_fill - best_price) / best_price,
        Side::Sell => (best_price - average_fill) / best_price,
    };

    (impact * dec!(100)).max(Decimal::ZERO)
}
