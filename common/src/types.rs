//! Core identifiers and market primitives

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported venues (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    /// OKX
    Okx,
    /// Binance
    Binance,
    /// Bybit
    Bybit,
}

impl Venue {
    /// All venues in aggregation order
    pub const ALL: [Venue; 3] = [Venue::Okx, Venue::Binance, Venue::Bybit];

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Okx => "OKX",
            Venue::Binance => "BINANCE",
            Venue::Bybit => "BYBIT",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instrument classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentType {
    /// Cash market
    Spot,
    /// Perpetual swap (funding-pegged)
    Perpetual,
    /// Dated futures
    Futures,
    /// Option contract
    Option,
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstrumentType::Spot => "SPOT",
            InstrumentType::Perpetual => "PERPETUAL",
            InstrumentType::Futures => "FUTURES",
            InstrumentType::Option => "OPTION",
        };
        f.write_str(s)
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy / long
    Buy,
    /// Sell / short
    Sell,
}

impl Side {
    /// +1 for Buy, -1 for Sell
    pub fn sign(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

/// Normalized symbol, e.g. `"BTC-USDT"`
///
/// Venue-native identifiers are mapped to this form inside the adapters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol from its normalized form
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the normalized string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Universal lookup key: (symbol, venue, instrument)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketDataKey {
    /// Normalized symbol
    pub symbol: Symbol,
    /// Venue the data came from
    pub venue: Venue,
    /// Instrument classification
    pub instrument: InstrumentType,
}

impl MarketDataKey {
    /// Create a new key
    pub fn new(symbol: Symbol, venue: Venue, instrument: InstrumentType) -> Self {
        Self {
            symbol,
            venue,
            instrument,
        }
    }
}

impl fmt::Display for MarketDataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.symbol, self.venue, self.instrument)
    }
}

/// One aggregated price level of an order book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Level price
    pub price: f64,
    /// Aggregate quantity resting at this price
    pub quantity: f64,
    /// Number of orders making up the level
    pub order_count: u32,
}

impl PriceLevel {
    /// Create a level with a single resting order
    pub fn new(price: f64, quantity: f64) -> Self {
        Self {
            price,
            quantity,
            order_count: 1,
        }
    }

    /// A level is empty when it carries no quantity
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.quantity <= 0.0
    }
}

/// Timestamp in nanoseconds since UNIX epoch
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Ts(pub u64);

impl Ts {
    /// Current wall-clock timestamp
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| std::time::Duration::from_secs(0))
            .as_nanos() as u64;
        Self(nanos)
    }

    /// Build from nanoseconds
    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Build from milliseconds
    pub fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000_000)
    }

    /// Nanoseconds since epoch
    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Microseconds since epoch
    pub fn as_micros(&self) -> u64 {
        self.0 / 1_000
    }

    /// Milliseconds since epoch
    pub fn as_millis(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Whole milliseconds elapsed since `earlier` (zero if `earlier` is ahead)
    pub fn millis_since(&self, earlier: Ts) -> u64 {
        self.0.saturating_sub(earlier.0) / 1_000_000
    }

    /// Fractional days until `later` (zero if already past)
    pub fn days_until(&self, later: Ts) -> f64 {
        later.0.saturating_sub(self.0) as f64 / (24.0 * 3600.0 * 1e9)
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_equality_is_componentwise() {
        let a = MarketDataKey::new(Symbol::from("BTC-USDT"), Venue::Okx, InstrumentType::Spot);
        let b = MarketDataKey::new(Symbol::from("BTC-USDT"), Venue::Okx, InstrumentType::Spot);
        let c = MarketDataKey::new(
            Symbol::from("BTC-USDT"),
            Venue::Okx,
            InstrumentType::Perpetual,
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn empty_level_detection() {
        assert!(PriceLevel::new(100.0, 0.0).is_empty());
        assert!(PriceLevel::new(100.0, -1.0).is_empty());
        assert!(!PriceLevel::new(100.0, 0.5).is_empty());
    }

    #[test]
    fn ts_conversions() {
        let ts = Ts::from_nanos(1_234_567_890);
        assert_eq!(ts.as_nanos(), 1_234_567_890);
        assert_eq!(ts.as_micros(), 1_234_567);
        assert_eq!(ts.as_millis(), 1_234);
    }

    #[test]
    fn ts_millis_since_saturates() {
        let early = Ts::from_millis(100);
        let late = Ts::from_millis(600);
        assert_eq!(late.millis_since(early), 500);
        assert_eq!(early.millis_since(late), 0);
    }

    #[test]
    fn side_sign() {
        assert_eq!(Side::Buy.sign(), 1.0);
        assert_eq!(Side::Sell.sign(), -1.0);
    }
}
