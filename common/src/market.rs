//! Ticker-level market data

use crate::types::{InstrumentType, MarketDataKey, Symbol, Ts, Venue};
use serde::{Deserialize, Serialize};

/// Latest top-of-book snapshot for one (symbol, venue, instrument)
///
/// Funding rate is populated for perpetuals only, expiry for futures only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    /// Normalized symbol
    pub symbol: Symbol,
    /// Source venue
    pub venue: Venue,
    /// Instrument classification
    pub instrument: InstrumentType,
    /// Event timestamp
    pub ts: Ts,
    /// Best bid price
    pub bid_price: f64,
    /// Best ask price
    pub ask_price: f64,
    /// Size resting at the best bid
    pub bid_size: f64,
    /// Size resting at the best ask
    pub ask_size: f64,
    /// Last traded price
    pub last_price: f64,
    /// Rolling 24h volume
    pub volume_24h: f64,
    /// Current funding rate per 8h period (perpetuals)
    pub funding_rate: Option<f64>,
    /// Contract expiry (futures)
    pub expiry: Option<Ts>,
}

impl MarketData {
    /// Lookup key for this entry
    pub fn key(&self) -> MarketDataKey {
        MarketDataKey::new(self.symbol.clone(), self.venue, self.instrument)
    }

    /// Mid price, absent when either side is unquoted
    pub fn mid(&self) -> Option<f64> {
        (self.bid_price > 0.0 && self.ask_price > 0.0)
            .then(|| (self.bid_price + self.ask_price) / 2.0)
    }

    /// Absolute spread, absent when either side is unquoted
    pub fn spread(&self) -> Option<f64> {
        (self.bid_price > 0.0 && self.ask_price > 0.0).then(|| self.ask_price - self.bid_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(bid: f64, ask: f64) -> MarketData {
        MarketData {
            symbol: Symbol::from("BTC-USDT"),
            venue: Venue::Binance,
            instrument: InstrumentType::Spot,
            ts: Ts::from_nanos(1),
            bid_price: bid,
            ask_price: ask,
            bid_size: 1.0,
            ask_size: 1.0,
            last_price: 0.0,
            volume_24h: 0.0,
            funding_rate: None,
            expiry: None,
        }
    }

    #[test]
    fn mid_and_spread() {
        let md = ticker(100.0, 102.0);
        assert_eq!(md.mid(), Some(101.0));
        assert_eq!(md.spread(), Some(2.0));
    }

    #[test]
    fn one_sided_ticker_has_no_mid() {
        let md = ticker(100.0, 0.0);
        assert_eq!(md.mid(), None);
        assert_eq!(md.spread(), None);
    }
}
