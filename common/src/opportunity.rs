//! Arbitrage opportunity schema

use crate::types::{InstrumentType, Side, Symbol, Ts, Venue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy that produced an opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Cross-venue spot price inversion
    Spot,
    /// Spot vs synthetic (perpetual-implied) mispricing
    Synthetic,
    /// Cross-venue funding-rate dispersion
    Funding,
}

impl StrategyKind {
    /// Tag used in opportunity ids
    pub fn tag(&self) -> &'static str {
        match self {
            StrategyKind::Spot => "SPOT",
            StrategyKind::Synthetic => "SYNTHETIC",
            StrategyKind::Funding => "FUNDING",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One leg of an arbitrage opportunity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityLeg {
    /// Normalized symbol
    pub symbol: Symbol,
    /// Venue to execute on
    pub venue: Venue,
    /// Buy or sell
    pub side: Side,
    /// Execution price
    pub price: f64,
    /// Execution quantity
    pub quantity: f64,
    /// Instrument of the leg
    pub instrument: InstrumentType,
    /// True when the leg is a synthetic construction rather than a quoted instrument
    pub is_synthetic: bool,
}

/// A time-bounded, risk-scored arbitrage opportunity
///
/// Every opportunity carries at least two legs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    /// `{strategy_tag}_{microseconds}` identifier
    pub id: String,
    /// Strategy that produced it
    pub strategy: StrategyKind,
    /// Creation time
    pub timestamp: Ts,
    /// Ordered execution legs
    pub legs: Vec<OpportunityLeg>,
    /// Expected profit in quote currency, net of fees
    pub expected_profit: f64,
    /// Expected profit as a percentage of capital
    pub profit_percentage: f64,
    /// Capital required to take both legs
    pub required_capital: f64,
    /// Execution risk score in [0, 1]
    pub execution_risk: f64,
    /// Funding-rate exposure of the position
    pub funding_risk: f64,
    /// Liquidity score in [0, 1]
    pub liquidity_score: f64,
    /// Lifetime in milliseconds from `timestamp`
    pub ttl_ms: u64,
    /// Executable iff profit is strictly positive and capital fits the limit
    pub is_executable: bool,
}

impl ArbitrageOpportunity {
    /// Generate the canonical id for a strategy at a timestamp
    pub fn make_id(strategy: StrategyKind, ts: Ts) -> String {
        format!("{}_{}", strategy.tag(), ts.as_micros())
    }

    /// Executability rule: strictly positive profit within the position cap
    pub fn executable(expected_profit: f64, required_capital: f64, max_position_size: f64) -> bool {
        expected_profit > 0.0 && required_capital <= max_position_size
    }

    /// Age in milliseconds at `now`
    pub fn age_ms(&self, now: Ts) -> u64 {
        now.millis_since(self.timestamp)
    }

    /// Whether the opportunity has outlived its TTL at `now`
    pub fn is_expired(&self, now: Ts) -> bool {
        self.age_ms(now) > self.ttl_ms
    }
}
