// Configuration management for the cost simulator

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::types::{FeeTier, OrderType, MAX_VOLATILITY_PCT, MIN_VOLATILITY_PCT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    pub exchange: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Default order size in quote currency (USD)
    pub quantity_usd: Decimal,
    /// Default volatility input, percent
    pub volatility_pct: Decimal,
    pub fee_tier: FeeTier,
    pub order_type: OrderType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed: FeedConfig {
                url: "wss://ws.gomarket-cpp.goquant.io/ws/l2-orderbook/okx/BTC-USDT-SWAP"
                    .to_string(),
                exchange: "OKX".to_string(),
                symbol: "BTC-USDT-SWAP".to_string(),
            },
            simulation: SimulationConfig {
                quantity_usd: dec!(100),
                volatility_pct: dec!(2.5),
                fee_tier: FeeTier::Tier1,
                order_type: OrderType::Market,
            },
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            tracing::info!("📁 Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.url.is_empty() {
            return Err(ConfigError::Validation("feed.url must not be empty".to_string()));
        }

        if !self.feed.url.starts_with("ws://") && !self.feed.url.starts_with("wss://") {
            return Err(ConfigError::Validation(format!(
                "feed.url must be a websocket URL, got '{}'",
                self.feed.url
            )));
        }

        if self.feed.symbol.is_empty() {
            return Err(ConfigError::Validation("feed.symbol must not be empty".to_string()));
        }

        if self.simulation.quantity_usd <= Decimal::ZERO {
            return Err(ConfigError::Validation(
                "simulation.quantity_usd must be positive".to_string(),
            ));
        }

        if self.simulation.volatility_pct < MIN_VOLATILITY_PCT
            || self.simulation.volatility_pct > MAX_VOLATILITY_PCT
        {
            return Err(ConfigError::Validation(format!(
                "simulation.volatility_pct must be within [{}, {}]",
                MIN_VOLATILITY_PCT, MAX_VOLATILITY_PCT
            )));
        }

        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "reconnect.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.base_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "reconnect.base_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(ConfigError::Validation(
                "reconnect.max_delay_ms must be >= reconnect.base_delay_ms".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
