//! Engine configuration, passed in at construction

use crate::constants;
use crate::types::{InstrumentType, Symbol, Venue};
use serde::{Deserialize, Serialize};

/// Process-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Worker threads for the runtime
    pub thread_pool_size: usize,
    /// Retained order-book depth per side
    pub order_book_depth: usize,
    /// Capacity of the normalized-update channel
    pub market_data_buffer_size: usize,
    /// Log filter, e.g. `"info"` or `"detector=debug"`
    pub log_level: String,
    /// Optional log file path (stdout when empty)
    pub log_file: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 16,
            order_book_depth: constants::MAX_ORDER_BOOK_DEPTH,
            market_data_buffer_size: constants::MARKET_DATA_BUFFER_SIZE,
            log_level: "info".to_string(),
            log_file: String::new(),
        }
    }
}

/// Detector and sizing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrageConfig {
    /// Minimum net profit threshold, in basis points
    ///
    /// The detector compares fee-adjusted spreads against this value; the
    /// unit is bps throughout (10 bps = 0.1%).
    pub min_profit_threshold_bps: f64,
    /// Maximum capital per opportunity in USD
    pub max_position_size: f64,
    /// Maximum total portfolio exposure in USD
    pub max_portfolio_exposure: f64,
    /// Opportunity lifetime in milliseconds
    pub opportunity_ttl_ms: u64,
    /// Expected slippage in basis points
    pub execution_slippage_bps: f64,
    /// Fee buffer subtracted from synthetic-arb profit, in basis points
    pub fee_buffer_bps: f64,
    /// Detection loop period in milliseconds
    pub detection_period_ms: u64,
    /// Symbols scanned by the detector
    pub symbols: Vec<Symbol>,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            min_profit_threshold_bps: constants::MIN_PROFIT_THRESHOLD_BPS,
            max_position_size: constants::MAX_POSITION_SIZE_USD,
            max_portfolio_exposure: constants::MAX_PORTFOLIO_EXPOSURE,
            opportunity_ttl_ms: constants::OPPORTUNITY_TTL_MS,
            execution_slippage_bps: constants::EXECUTION_SLIPPAGE_BPS,
            fee_buffer_bps: constants::SYNTHETIC_FEE_BUFFER_BPS,
            detection_period_ms: constants::DETECTION_PERIOD_MS,
            symbols: vec![
                Symbol::from("BTC-USDT"),
                Symbol::from("ETH-USDT"),
                Symbol::from("SOL-USDT"),
            ],
        }
    }
}

/// Per-venue feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Display name
    pub name: String,
    /// Venue identifier
    pub venue: Venue,
    /// Whether the venue participates at all
    pub enabled: bool,
    /// Public websocket endpoint
    #[serde(default)]
    pub ws_endpoint: String,
    /// Symbols to subscribe on this venue
    #[serde(default)]
    pub symbols: Vec<Symbol>,
    /// Instrument types to subscribe per symbol
    #[serde(default = "default_instruments")]
    pub instrument_types: Vec<InstrumentType>,
    /// Delay between reconnect attempts in milliseconds
    #[serde(default = "default_reconnect_ms")]
    pub reconnect_interval_ms: u64,
    /// Bounded reconnect attempts before giving up
    #[serde(default = "default_max_reconnects")]
    pub max_reconnect_attempts: u32,
    /// Heartbeat interval in milliseconds
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_instruments() -> Vec<InstrumentType> {
    vec![InstrumentType::Spot, InstrumentType::Perpetual]
}

fn default_reconnect_ms() -> u64 {
    constants::RECONNECT_DELAY_MS
}

fn default_max_reconnects() -> u32 {
    constants::MAX_RECONNECT_ATTEMPTS
}

fn default_heartbeat_ms() -> u64 {
    constants::HEARTBEAT_INTERVAL_MS
}

impl VenueConfig {
    /// Enabled config with defaults for a venue
    pub fn for_venue(venue: Venue) -> Self {
        Self {
            name: venue.as_str().to_string(),
            venue,
            enabled: true,
            ws_endpoint: String::new(),
            symbols: Vec::new(),
            instrument_types: default_instruments(),
            reconnect_interval_ms: default_reconnect_ms(),
            max_reconnect_attempts: default_max_reconnects(),
            heartbeat_interval_ms: default_heartbeat_ms(),
        }
    }
}

/// Top-level configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Process-level settings
    pub system: SystemConfig,
    /// Detector and sizing settings
    pub arbitrage: ArbitrageConfig,
    /// Venue feed settings
    pub venues: Vec<VenueConfig>,
}
