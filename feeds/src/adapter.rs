//! Venue adapter contract

use crate::event::FeedEvent;
use async_trait::async_trait;
use common::constants::{HEARTBEAT_INTERVAL_MS, MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY_MS};
use common::{InstrumentType, Symbol, Venue};
use thiserror::Error;
use tokio::sync::mpsc;

/// Adapter failures
///
/// Transport problems never cross the adapter boundary as errors on the data
/// path; they surface here only from the connection-management calls.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Operation requires an open connection
    #[error("{venue} adapter is not connected")]
    NotConnected {
        /// Offending venue
        venue: Venue,
    },

    /// Connect or reconnect failed
    #[error("{venue} connection failed: {reason}")]
    ConnectionFailed {
        /// Offending venue
        venue: Venue,
        /// Transport-level cause
        reason: String,
    },

    /// Subscription request rejected
    #[error("{venue} subscription failed for {symbol}: {reason}")]
    SubscriptionFailed {
        /// Offending venue
        venue: Venue,
        /// Requested symbol
        symbol: Symbol,
        /// Venue-reported cause
        reason: String,
    },

    /// Bounded reconnect attempts exhausted
    #[error("{venue} gave up after {attempts} reconnect attempts")]
    ReconnectExhausted {
        /// Offending venue
        venue: Venue,
        /// Attempts made
        attempts: u32,
    },
}

/// Connection parameters shared by all adapters
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Display name for logs
    pub name: String,
    /// Venue this adapter serves
    pub venue: Venue,
    /// Bounded reconnect attempts before giving up
    pub max_reconnects: u32,
    /// Delay between reconnect attempts in milliseconds
    pub reconnect_delay_ms: u64,
    /// Heartbeat interval; silence for twice this forces a reconnect
    pub heartbeat_interval_ms: u64,
}

impl FeedConfig {
    /// Defaults for a venue
    pub fn for_venue(venue: Venue) -> Self {
        Self {
            name: venue.as_str().to_string(),
            venue,
            max_reconnects: MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: RECONNECT_DELAY_MS,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
        }
    }
}

/// One venue's normalized market-data source
///
/// Implementations own the wire protocol, reconnection (bounded retries,
/// re-subscribing every previously subscribed stream, and re-fetching a book
/// snapshot before applying deltas) and heartbeat supervision. `connect` and
/// `disconnect` are idempotent.
#[async_trait]
pub trait VenueAdapter: Send {
    /// Venue this adapter serves
    fn venue(&self) -> Venue;

    /// Connection parameters, consulted by the feed supervisor
    fn config(&self) -> FeedConfig;

    /// Open the transport; a no-op when already connected
    async fn connect(&mut self) -> Result<(), FeedError>;

    /// Close the transport; a no-op when already disconnected
    async fn disconnect(&mut self) -> Result<(), FeedError>;

    /// Subscribe to depth updates for a symbol
    async fn subscribe_orderbook(
        &mut self,
        symbol: &Symbol,
        instrument: InstrumentType,
    ) -> Result<(), FeedError>;

    /// Subscribe to the trade stream for a symbol
    async fn subscribe_trades(
        &mut self,
        symbol: &Symbol,
        instrument: InstrumentType,
    ) -> Result<(), FeedError>;

    /// Subscribe to ticker refreshes for a symbol
    async fn subscribe_ticker(
        &mut self,
        symbol: &Symbol,
        instrument: InstrumentType,
    ) -> Result<(), FeedError>;

    /// Subscribe to funding-rate updates for a perpetual symbol
    async fn subscribe_funding_rate(&mut self, symbol: &Symbol) -> Result<(), FeedError>;

    /// Drop the depth subscription for a symbol
    async fn unsubscribe_orderbook(
        &mut self,
        symbol: &Symbol,
        instrument: InstrumentType,
    ) -> Result<(), FeedError>;

    /// Drop every subscription
    async fn unsubscribe_all(&mut self) -> Result<(), FeedError>;

    /// Pump normalized events into `tx` until the stream ends
    ///
    /// Returns `Ok` on orderly stream end (the supervisor decides whether to
    /// reconnect) and `Err` on unrecoverable transport failure.
    async fn run(&mut self, tx: mpsc::Sender<FeedEvent>) -> Result<(), FeedError>;
}
