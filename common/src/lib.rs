//! Shared types for the cross-venue arbitrage engine

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod constants;
pub mod market;
pub mod opportunity;
pub mod position;
pub mod types;

pub use config::{ArbitrageConfig, EngineConfig, SystemConfig, VenueConfig};
pub use market::MarketData;
pub use opportunity::{ArbitrageOpportunity, OpportunityLeg, StrategyKind};
pub use position::Position;
pub use types::{InstrumentType, MarketDataKey, PriceLevel, Side, Symbol, Ts, Venue};
