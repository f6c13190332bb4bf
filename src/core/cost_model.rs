// Transaction cost models: book-walk slippage, Almgren-Chriss-style
// impact, logistic maker/taker estimator, fee lookup, net-cost aggregation

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Instant;

use crate::core::metrics::{self, MarketMetrics};
use crate::types::{OrderBookSnapshot, Side, SimulationParameters, SimulationResult};

/// Calibration knobs for the impact and maker/taker models.
///
/// These are tunable defaults, not values derived from market data.
#[derive(Debug, Clone)]
pub struct ModelParams {
    /// Permanent impact coefficient (eta)
    pub eta: Decimal,
    /// Temporary impact coefficient (gamma)
    pub gamma: Decimal,
    /// Maker/taker logistic: base offset
    pub mt_offset: f64,
    /// Maker/taker logistic: weight on relative order size
    pub mt_size_weight: f64,
    /// Maker/taker logistic: weight on spread-to-depth ratio
    pub mt_spread_weight: f64,
    /// Maker/taker logistic: weight on log(1 + depth)
    pub mt_depth_weight: f64,
    /// Maker/taker logistic: weight on imbalance magnitude
    pub mt_imbalance_weight: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            eta: dec!(0.01),
            gamma: dec!(0.1),
            mt_offset: 1.0,
            mt_size_weight: 2.0,
            mt_spread_weight: 0.5,
            mt_depth_weight: 0.3,
            mt_imbalance_weight: 0.8,
        }
    }
}

/// Deterministic cost estimator. One synchronous pass per call, no I/O.
#[derive(Debug, Clone, Default)]
pub struct CostModelEngine {
    params: ModelParams,
}

impl CostModelEngine {
    pub fn new(params: ModelParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Produce one estimate from a snapshot, its metrics and the user
    /// parameters. Quantity is quote-denominated; models that need base
    /// units convert via the best ask.
    pub fn estimate(
        &self,
        snapshot: &OrderBookSnapshot,
        market: &MarketMetrics,
        params: &SimulationParameters,
    ) -> SimulationResult {
        let started = Instant::now();

        let best_ask = snapshot
            .best_ask()
            .map(|l| l.price)
            .unwrap_or(Decimal::ZERO);
        let quantity_base = if best_ask > Decimal::ZERO {
            params.quantity / best_ask
        } else {
            Decimal::ZERO
        };

        let expected_slippage_pct = self.expected_slippage(snapshot, market, quantity_base);
        let expected_fees = params.quantity * params.fee_tier.rate();
        let expected_market_impact_pct =
            self.market_impact(market, quantity_base, params.volatility_pct);
        let maker_taker_proportion = self.maker_taker(snapshot, market, quantity_base);

        let net_cost = params.quantity * expected_slippage_pct / dec!(100)
            + expected_fees
            + params.quantity * expected_market_impact_pct / dec!(100);

        SimulationResult {
            expected_slippage_pct,
            expected_fees,
            expected_market_impact_pct,
            net_cost,
            maker_taker_proportion,
            compute_latency_ms: started.elapsed().as_secs_f64() * 1_000.0,
        }
    }

    /// Book-walk slippage scaled up by imbalance and down-weighted by depth
    fn expected_slippage(
        &self,
        snapshot: &OrderBookSnapshot,
        market: &MarketMetrics,
        quantity_base: Decimal,
    ) -> Decimal {
        let book_walk = metrics::price_impact(snapshot, Side::Buy, quantity_base);
        let imbalance_scale = dec!(1) + dec!(0.5) * market.imbalance.abs();
        let depth_scale = dec!(1) + dec!(100) / (market.depth + dec!(1));
        (book_walk * imbalance_scale * depth_scale).max(Decimal::ZERO)
    }

    /// Two-term Almgren-Chriss-style estimate.
    ///
    /// Permanent impact is linear in base quantity; temporary impact is
    /// quadratic and volatility-scaled; the sum is inflated on thin books
    /// by `1 + 1/sqrt(depth)`. An empty depth band floors the divisor at 1
    /// so the estimate stays finite.
    fn market_impact(
        &self,
        market: &MarketMetrics,
        quantity_base: Decimal,
        volatility_pct: Decimal,
    ) -> Decimal {
        let volatility = volatility_pct / dec!(100);
        let permanent = self.params.eta * quantity_base;
        let temporary = self.params.gamma / dec!(2) * quantity_base * quantity_base * volatility;

        let depth = if market.depth > Decimal::ZERO {
            market.depth
        } else {
            dec!(1)
        };
        let depth_scale = dec!(1) + dec!(1) / sqrt_decimal(depth);

        ((permanent + temporary) * depth_scale).max(Decimal::ZERO)
    }

    /// Logistic estimate of the maker fraction of the fill.
    ///
    /// Large orders relative to the top of book, wide spreads and lopsided
    /// books push toward taker; deep books push toward maker. Runs in f64
    /// (transcendentals), clamped to [0, 1].
    fn maker_taker(
        &self,
        snapshot: &OrderBookSnapshot,
        market: &MarketMetrics,
        quantity_base: Decimal,
    ) -> f64 {
        let top_size = snapshot
            .best_ask()
            .map(|l| l.size)
            .unwrap_or(Decimal::ZERO);

        let relative_size = if top_size > Decimal::ZERO {
            (quantity_base / top_size).to_f64().unwrap_or(f64::MAX)
        } else {
            0.0
        };

        let depth = market.depth.to_f64().unwrap_or(0.0).max(0.0);
        let spread = market.spread.to_f64().unwrap_or(0.0).max(0.0);
        let spread_to_depth = spread / depth.max(1.0);
        let imbalance = market.imbalance.to_f64().unwrap_or(0.0).abs();

        let z = self.params.mt_offset - self.params.mt_size_weight * relative_size
            - self.params.mt_spread_weight * spread_to_depth
            + self.params.mt_depth_weight * (1.0 + depth).ln()
            - self.params.mt_imbalance_weight * imbalance;

        logistic(z).clamp(0.0, 1.0)
    }
}

fn logistic(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Decimal square root via Newton's method
fn sqrt_decimal(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let mut guess = value / dec!(2);
    if guess.is_zero() {
        guess = dec!(0.0001);
    }

    for _ in 0..12 {
        let next = (guess + value / guess) / dec!(2);
        if (next - guess).abs() < dec!(0.0000001) {
            return next;
        }
        guess = next;
    }
    guess
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::compute;
    use crate::types::{BookLevel, FeeTier, OrderType};
    use chrono::Utc;

    fn reference_book() -> OrderBookSnapshot {
        OrderBookSnapshot {
            timestamp: Utc::now(),
            exchange: "OKX".to_string(),
            symbol: "BTC-USDT-SWAP".to_string(),
            asks: vec![
                BookLevel::new(dec!(100), dec!(2)),
                BookLevel::new(dec!(101), dec!(3)),
            ],
            bids: vec![
                BookLevel::new(dec!(99), dec!(5)),
                BookLevel::new(dec!(98), dec!(1)),
            ],
        }
    }

    fn params(quantity: Decimal) -> SimulationParameters {
        SimulationParameters {
            exchange: "OKX".to_string(),
            asset: "BTC-USDT-SWAP".to_string(),
            order_type: OrderType::Market,
            quantity,
            volatility_pct: dec!(2.5),
            fee_tier: FeeTier::Tier1,
        }
    }

    #[test]
    fn test_result_invariants() {
        let engine = CostModelEngine::default();
        let snap = reference_book();
        let m = compute(&snap);
        let result = engine.estimate(&snap, &m, &params(dec!(100)));

        assert!(result.expected_slippage_pct >= Decimal::ZERO);
        assert!(result.expected_market_impact_pct >= Decimal::ZERO);
        assert!(result.expected_fees >= Decimal::ZERO);
        assert!(result.net_cost >= Decimal::ZERO);
        assert!((0.0..=1.0).contains(&result.maker_taker_proportion));
        assert!(result.compute_latency_ms.is_finite());
    }

    #[test]
    fn test_small_order_has_zero_slippage() {
        // 100 USD at best ask 100 is exactly 1 base unit: inside the top level
        let engine = CostModelEngine::default();
        let snap = reference_book();
        let m = compute(&snap);
        let result = engine.estimate(&snap, &m, &params(dec!(100)));

        assert_eq!(result.expected_slippage_pct, Decimal::ZERO);
    }

    #[test]
    fn test_fees_follow_tier_table() {
        let engine = CostModelEngine::default();
        let snap = reference_book();
        let m = compute(&snap);

        let result = engine.estimate(&snap, &m, &params(dec!(1000)));
        assert_eq!(result.expected_fees, dec!(1000) * FeeTier::Tier1.rate());

        let mut p = params(dec!(1000));
        p.fee_tier = FeeTier::Tier3;
        let result = engine.estimate(&snap, &m, &p);
        assert_eq!(result.expected_fees, dec!(0.6));
    }

    #[test]
    fn test_insufficient_liquidity_saturates_not_explodes() {
        // 1000 USD at best ask 100 is 10 base units; the book only has 5
        let engine = CostModelEngine::default();
        let snap = reference_book();
        let m = compute(&snap);
        let result = engine.estimate(&snap, &m, &params(dec!(1000)));

        // Sentinel propagates into slippage (scaled, still finite)
        assert!(result.expected_slippage_pct >= metrics::INSUFFICIENT_LIQUIDITY_IMPACT_PCT);
        assert!(result.net_cost > Decimal::ZERO);
        // Bounded well below anything resembling an unbounded blowup
        assert!(result.net_cost < dec!(10000000));
    }

    #[test]
    fn test_impact_grows_with_quantity() {
        let engine = CostModelEngine::default();
        let snap = reference_book();
        let m = compute(&snap);

        let small = engine.estimate(&snap, &m, &params(dec!(100)));
        let large = engine.estimate(&snap, &m, &params(dec!(400)));
        assert!(large.expected_market_impact_pct > small.expected_market_impact_pct);
    }

    #[test]
    fn test_maker_fraction_drops_for_large_orders() {
        let engine = CostModelEngine::default();
        let snap = reference_book();
        let m = compute(&snap);

        let small = engine.estimate(&snap, &m, &params(dec!(50)));
        let large = engine.estimate(&snap, &m, &params(dec!(450)));
        assert!(large.maker_taker_proportion < small.maker_taker_proportion);
    }

    #[test]
    fn test_degenerate_book_stays_finite() {
        // No bids at all: metrics are neutral, estimate must not panic
        let engine = CostModelEngine::default();
        let snap = OrderBookSnapshot {
            timestamp: Utc::now(),
            exchange: "OKX".to_string(),
            symbol: "BTC-USDT-SWAP".to_string(),
            asks: vec![BookLevel::new(dec!(100), dec!(2))],
            bids: vec![],
        };
        let m = compute(&snap);
        let result = engine.estimate(&snap, &m, &params(dec!(100)));
        assert!((0.0..=1.0).contains(&result.maker_taker_proportion));
        assert!(result.net_cost >= Decimal::ZERO);
    }

    #[test]
    fn test_sqrt_decimal() {
        assert!((sqrt_decimal(dec!(4)) - dec!(2)).abs() < dec!(0.0001));
        assert!((sqrt_decimal(dec!(100)) - dec!(10)).abs() < dec!(0.0001));
        assert!((sqrt_decimal(dec!(0.25)) - dec!(0.5)).abs() < dec!(0.0001));
        assert_eq!(sqrt_decimal(Decimal::ZERO), Decimal::ZERO);
    }
}
