// Trade Cost Simulator Library
//
// Streams L2 order-book snapshots for a single instrument over a resilient
// websocket feed and recomputes a deterministic transaction-cost estimate
// (slippage, fees, market impact, maker/taker split, net cost) on every
// update or parameter change.

pub mod config;
pub mod core;
pub mod error;
pub mod feed;
pub mod types;

// Re-export core engine types
pub use self::core::{
    CostModelEngine, MarketMetrics, ModelParams, SimulationOrchestrator, SimulationView,
};

// Re-export error types
pub use error::{SimError, SimResult};

// Re-export feed types
pub use feed::{ConnectionState, FeedEvent, OrderBookFeed};

// Re-export configuration
pub use config::{Config, ConfigError, FeedConfig, ReconnectConfig, SimulationConfig};

// Re-export domain types
pub use types::{
    BookLevel, FeeTier, OrderBookSnapshot, OrderType, Side, SimulationParameters,
    SimulationResult, TimeSeriesPoint,
};
