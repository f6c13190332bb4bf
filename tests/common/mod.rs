// Shared fixtures for integration tests

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use trade_cost_sim::{
    BookLevel, FeeTier, OrderBookSnapshot, OrderType, SimulationParameters,
};

pub fn snapshot(asks: &[(Decimal, Decimal)], bids: &[(Decimal, Decimal)]) -> OrderBookSnapshot {
    OrderBookSnapshot {
        timestamp: Utc.with_ymd_and_hms(2025, 5, 4, 10, 39, 13).unwrap(),
        exchange: "OKX".to_string(),
        symbol: "BTC-USDT-SWAP".to_string(),
        asks: asks.iter().map(|&(p, s)| BookLevel::new(p, s)).collect(),
        bids: bids.iter().map(|&(p, s)| BookLevel::new(p, s)).collect(),
    }
}

/// Small two-level book with known walk arithmetic:
/// asks [[100, 2], [101, 3]], bids [[99, 5], [98, 1]]
pub fn reference_book() -> OrderBookSnapshot {
    snapshot(
        &[(dec!(100), dec!(2)), (dec!(101), dec!(3))],
        &[(dec!(99), dec!(5)), (dec!(98), dec!(1))],
    )
}

pub fn default_params() -> SimulationParameters {
    SimulationParameters {
        exchange: "OKX".to_string(),
        asset: "BTC-USDT-SWAP".to_string(),
        order_type: OrderType::Market,
        quantity: dec!(100),
        volatility_pct: dec!(2.5),
        fee_tier: FeeTier::Tier1,
    }
}
