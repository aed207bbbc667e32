//! Normalized events emitted by venue adapters

use common::{MarketData, MarketDataKey, PriceLevel, Ts, Venue};

/// One normalized update out of a venue stream
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Ticker refresh (top of book, last trade, funding for perpetuals)
    Ticker(MarketData),
    /// Full-side order book replacement
    Book {
        /// Book being updated
        key: MarketDataKey,
        /// New bid ladder (any order; the store sorts and trims)
        bids: Vec<PriceLevel>,
        /// New ask ladder
        asks: Vec<PriceLevel>,
        /// Event timestamp
        ts: Ts,
    },
    /// Transport-level failure surfaced for counting; the adapter recovers
    Error {
        /// Venue the failure came from
        venue: Venue,
        /// Human-readable cause
        message: String,
    },
}
