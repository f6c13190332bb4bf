// Common types used across the simulator

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SimError;

/// One price level on a single side of the book
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl BookLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Complete order-book state for one instrument, delivered as a single event.
///
/// Levels are carried in wire order. Within a side they should be monotonic
/// by price (ascending asks, descending bids) but consumers must not rely on
/// that; the metrics calculator sorts defensively.
#[derive(Debug, Clone)]
pub struct OrderBookSnapshot {
    pub timestamp: DateTime<Utc>,
    pub exchange: String,
    pub symbol: String,
    pub asks: Vec<BookLevel>,
    pub bids: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    /// Lowest-priced ask level with positive size
    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks
            .iter()
            .filter(|l| l.size > Decimal::ZERO)
            .min_by(|a, b| a.price.cmp(&b.price))
    }

    /// Highest-priced bid level with positive size
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids
            .iter()
            .filter(|l| l.size > Decimal::ZERO)
            .max_by(|a, b| a.price.cmp(&b.price))
    }

    /// True when both sides have a usable best level
    pub fn has_both_sides(&self) -> bool {
        self.best_ask().is_some() && self.best_bid().is_some()
    }
}

/// Book side from the aggressor's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
        }
    }
}

impl OrderType {
    pub fn parse(s: &str) -> Result<Self, SimError> {
        match s.to_ascii_lowercase().as_str() {
            "market" => Ok(OrderType::Market),
            "limit" => Ok(OrderType::Limit),
            other => Err(SimError::InvalidParameter {
                name: "order_type".to_string(),
                reason: format!("unknown order type '{}'", other),
            }),
        }
    }
}

/// Exchange fee tier. The rate table is fixed at startup; an unrecognized
/// tier name falls back to [`FeeTier::Tier1`] explicitly rather than
/// silently charging zero fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeeTier {
    Tier1,
    Tier2,
    Tier3,
}

impl FeeTier {
    /// Taker fee rate for this tier, as a fraction of notional
    pub fn rate(&self) -> Decimal {
        match self {
            FeeTier::Tier1 => dec!(0.0010),
            FeeTier::Tier2 => dec!(0.0008),
            FeeTier::Tier3 => dec!(0.0006),
        }
    }

    /// Parse a tier name, falling back to the base tier for unknown input
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "tier1" | "1" => FeeTier::Tier1,
            "tier2" | "2" => FeeTier::Tier2,
            "tier3" | "3" => FeeTier::Tier3,
            other => {
                tracing::warn!("Unknown fee tier '{}', falling back to tier1", other);
                FeeTier::Tier1
            }
        }
    }
}

impl From<String> for FeeTier {
    fn from(s: String) -> Self {
        FeeTier::parse(&s)
    }
}

impl From<FeeTier> for String {
    fn from(t: FeeTier) -> String {
        t.to_string()
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeTier::Tier1 => write!(f, "tier1"),
            FeeTier::Tier2 => write!(f, "tier2"),
            FeeTier::Tier3 => write!(f, "tier3"),
        }
    }
}

// Volatility parameter bounds (percent)
pub const MIN_VOLATILITY_PCT: Decimal = dec!(0.1);
pub const MAX_VOLATILITY_PCT: Decimal = dec!(10);

/// User-supplied inputs to the cost model
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    pub exchange: String,
    pub asset: String,
    pub order_type: OrderType,
    /// Order size in quote currency (USD)
    pub quantity: Decimal,
    /// Volatility input, percent
    pub volatility_pct: Decimal,
    pub fee_tier: FeeTier,
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.quantity <= Decimal::ZERO {
            return Err(SimError::InvalidParameter {
                name: "quantity".to_string(),
                reason: format!("must be positive, got {}", self.quantity),
            });
        }
        if self.volatility_pct < MIN_VOLATILITY_PCT || self.volatility_pct > MAX_VOLATILITY_PCT {
            return Err(SimError::InvalidParameter {
                name: "volatility_pct".to_string(),
                reason: format!(
                    "must be within [{}, {}], got {}",
                    MIN_VOLATILITY_PCT, MAX_VOLATILITY_PCT, self.volatility_pct
                ),
            });
        }
        if self.asset.is_empty() {
            return Err(SimError::InvalidParameter {
                name: "asset".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Output of one cost-model pass. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub expected_slippage_pct: Decimal,
    pub expected_fees: Decimal,
    pub expected_market_impact_pct: Decimal,
    pub net_cost: Decimal,
    /// Estimated maker fraction of the fill, in [0, 1]
    pub maker_taker_proportion: f64,
    /// Wall-clock time of the model pass. Diagnostic only.
    pub compute_latency_ms: f64,
}

/// One entry of the orchestrator's bounded result history
#[derive(Debug, Clone, Serialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub best_ask: Decimal,
    pub best_bid: Decimal,
    pub expected_slippage_pct: Decimal,
    pub expected_fees: Decimal,
    pub expected_market_impact_pct: Decimal,
    pub net_cost: Decimal,
    pub maker_taker_proportion: f64,
}

impl TimeSeriesPoint {
    pub fn new(
        timestamp: DateTime<Utc>,
        best_ask: Decimal,
        best_bid: Decimal,
        result: &SimulationResult,
    ) -> Self {
        Self {
            timestamp,
            best_ask,
            best_bid,
            expected_slippage_pct: result.expected_slippage_pct,
            expected_fees: result.expected_fees,
            expected_market_impact_pct: result.expected_market_impact_pct,
            net_cost: result.net_cost,
            maker_taker_proportion: result.maker_taker_proportion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SimulationParameters {
        SimulationParameters {
            exchange: "OKX".to_string(),
            asset: "BTC-USDT-SWAP".to_string(),
            order_type: OrderType::Market,
            quantity: dec!(100),
            volatility_pct: dec!(2.5),
            fee_tier: FeeTier::Tier1,
        }
    }

    #[test]
    fn test_fee_tier_fallback() {
        assert_eq!(FeeTier::parse("tier2"), FeeTier::Tier2);
        assert_eq!(FeeTier::parse("TIER3"), FeeTier::Tier3);
        // Unknown tiers fall back to the base tier, never zero fees
        assert_eq!(FeeTier::parse("vip9"), FeeTier::Tier1);
        assert!(FeeTier::parse("vip9").rate() > Decimal::ZERO);
    }

    #[test]
    fn test_fee_rates_ordered() {
        assert!(FeeTier::Tier1.rate() > FeeTier::Tier2.rate());
        assert!(FeeTier::Tier2.rate() > FeeTier::Tier3.rate());
    }

    #[test]
    fn test_parameter_validation() {
        assert!(params().validate().is_ok());

        let mut p = params();
        p.quantity = Decimal::ZERO;
        assert!(p.validate().is_err());

        let mut p = params();
        p.volatility_pct = dec!(0.05);
        assert!(p.validate().is_err());

        let mut p = params();
        p.volatility_pct = dec!(11);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_order_type_parse() {
        assert_eq!(OrderType::parse("market").unwrap(), OrderType::Market);
        assert_eq!(OrderType::parse("Limit").unwrap(), OrderType::Limit);
        assert!(OrderType::parse("stop").is_err());
    }

    #[test]
    fn test_best_levels_ignore_unsorted_input() {
        let snap = OrderBookSnapshot {
            timestamp: Utc::now(),
            exchange: "OKX".to_string(),
            symbol: "BTC-USDT-SWAP".to_string(),
            asks: vec![
                BookLevel::new(dec!(101), dec!(1)),
                BookLevel::new(dec!(100), dec!(2)),
            ],
            bids: vec![
                BookLevel::new(dec!(98), dec!(1)),
                BookLevel::new(dec!(99), dec!(5)),
            ],
        };
        assert_eq!(snap.best_ask().unwrap().price, dec!(100));
        assert_eq!(snap.best_bid().unwrap().price, dec!(99));
    }

    #[test]
    fn test_empty_side_has_no_best() {
        let snap = OrderBookSnapshot {
            timestamp: Utc::now(),
            exchange: "OKX".to_string(),
            symbol: "BTC-USDT-SWAP".to_string(),
            asks: vec![],
            bids: vec![BookLevel::new(dec!(99), dec!(5))],
        };
        assert!(snap.best_ask().is_none());
        assert!(!snap.has_both_sides());
    }

    #[test]
    fn test_zero_size_levels_ignored() {
        let snap = OrderBookSnapshot {
            timestamp: Utc::now(),
            exchange: "OKX".to_string(),
            symbol: "BTC-USDT-SWAP".to_string(),
            asks: vec![
                BookLevel::new(dec!(100), Decimal::ZERO),
                BookLevel::new(dec!(101), dec!(1)),
            ],
            bids: vec![BookLevel::new(dec!(99), dec!(5))],
        };
        assert_eq!(snap.best_ask().unwrap().price, dec!(101));
    }
}
